/// Currencies quoted without minor units.
const ZERO_DECIMAL_CURRENCIES: &[&str] = &["VND", "JPY"];

/// Format a number with thousands separators and a fixed number of decimals: 1,234.56
pub fn grouped(val: f64, decimals: usize) -> String {
    let negative = val < 0.0;
    let fixed = format!("{:.*}", decimals, val.abs());
    let (int_part, dec_part) = match fixed.split_once('.') {
        Some((i, d)) => (i, Some(d)),
        None => (fixed.as_str(), None),
    };

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let mut out: String = with_commas.chars().rev().collect();
    if let Some(d) = dec_part {
        out.push('.');
        out.push_str(d);
    }
    if negative {
        out.insert(0, '-');
    }
    out
}

/// Format an amount in the given currency: `1,234.56 USD`, `1,500,000 VND`.
pub fn money(val: f64, currency: &str) -> String {
    let code = currency.trim().to_uppercase();
    let decimals = if ZERO_DECIMAL_CURRENCIES.contains(&code.as_str()) { 0 } else { 2 };
    if code.is_empty() {
        grouped(val, decimals)
    } else {
        format!("{} {code}", grouped(val, decimals))
    }
}
