use crate::commission::RatePolicy;
use crate::error::Result;
use crate::settings::{load_settings, save_settings, settings_path};

pub fn show() -> Result<()> {
    let settings = load_settings();
    println!("Settings:  {}", settings_path().display());
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn set(
    salesperson_column: Option<String>,
    amount_column: Option<String>,
    client_column: Option<String>,
    product_column: Option<String>,
    rate: Option<f64>,
    tiered: bool,
    unassigned_label: Option<String>,
) -> Result<()> {
    let mut settings = load_settings();

    if let Some(name) = salesperson_column {
        settings.columns.salesperson = name;
    }
    if let Some(name) = amount_column {
        settings.columns.amount = name;
    }
    if let Some(name) = client_column {
        settings.columns.client_id = name;
    }
    if let Some(name) = product_column {
        settings.columns.product = name;
    }
    if let Some(p) = rate {
        settings.rate = RatePolicy::flat(p)?;
    }
    if tiered {
        settings.rate = RatePolicy::default();
    }
    if let Some(label) = unassigned_label {
        settings.unassigned_label = label;
    }

    save_settings(&settings)?;
    println!("Saved {}", settings_path().display());
    Ok(())
}
