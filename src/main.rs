mod cache;
mod cli;
mod db;
mod error;
mod expense;
mod fmt;
mod models;
mod parser;
mod selection;
mod settings;
mod stage;
mod store;
mod submission;
mod tui;
mod validation;
mod workflow;

use clap::Parser;

use cli::{
    Cli, Commands, ExpensesCommands, LookupsCommands, PlansCommands, ReportsCommands, TermsCommands,
    UsersCommands,
};
use store::ExpenseFilter;

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir, user } => cli::init::run(data_dir, user),
        Commands::Status => cli::status::run(),
        Commands::Terms { command } => match command {
            TermsCommands::Add { name, start, end } => cli::terms::add(&name, &start, &end),
            TermsCommands::SetStatus { term, status } => cli::terms::set_status(&term, &status),
            TermsCommands::List => cli::terms::list(),
        },
        Commands::Plans { command } => match command {
            PlansCommands::Upload {
                file,
                term,
                plan_name,
                dry_run,
                json,
                force,
            } => cli::plans::upload(
                &file,
                &term,
                cli::plans::UploadOptions {
                    plan_name: plan_name.as_deref(),
                    dry_run,
                    json,
                    force,
                },
            ),
            PlansCommands::List { term } => cli::plans::list(term.as_deref()),
        },
        Commands::Reports { command } => match command {
            ReportsCommands::Create { term, name } => cli::reports::create(&term, &name),
            ReportsCommands::List { term } => cli::reports::list(term.as_deref()),
            ReportsCommands::Review {
                file,
                report,
                dry_run,
                json,
            } => cli::reports::review(&file, report, dry_run, json),
        },
        Commands::Expenses { command } => match command {
            ExpensesCommands::List { plan, report } => cli::expenses::list(ExpenseFilter {
                plan_id: plan,
                report_id: report,
            }),
            ExpensesCommands::Export {
                output,
                plan,
                report,
            } => cli::expenses::export(
                &output,
                ExpenseFilter {
                    plan_id: plan,
                    report_id: report,
                },
            ),
        },
        Commands::Lookups { command } => match command {
            LookupsCommands::Add { kind, name } => cli::lookups::add(&kind, &name),
            LookupsCommands::List { kind } => cli::lookups::list(kind.as_deref()),
        },
        Commands::Users { command } => match command {
            UsersCommands::Add {
                username,
                role,
                department,
            } => cli::users::add(&username, &role, department.as_deref()),
            UsersCommands::List => cli::users::list(),
        },
        Commands::Template { output } => cli::template::run(&output),
        Commands::Wizard => cli::wizard::run(),
    };

    if let Err(e) = result {
        log::debug!("command failed: {e:?}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
