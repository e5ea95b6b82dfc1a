use dealerbot_core::inventory::Catalog;

use crate::commands::{load_config, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("inventory") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let catalog = match Catalog::load(&config.inventory.path) {
        Ok(catalog) => catalog,
        Err(error) => return CommandResult::failure("inventory", "inventory_data", error.to_string(), 6),
    };

    let categories: Vec<String> =
        catalog.categories().map(|(name, count)| format!("{name}={count}")).collect();
    let total = catalog.flatten().len();

    CommandResult::success(
        "inventory",
        format!(
            "loaded {total} vehicles from {} ({})",
            config.inventory.path.display(),
            if categories.is_empty() { "no categories".to_string() } else { categories.join(", ") }
        ),
    )
}
