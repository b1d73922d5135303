//! Templates command - inspect the local template store

use console::style;
use corral_store::{APPS, CategoryStores};

use crate::display::{print_template, print_template_header, template_row};
use crate::error::{CliError, Result};

/// List loaded templates, optionally of one category
pub fn list(stores: &CategoryStores, category: Option<&str>) -> Result<()> {
    let mut rows = Vec::new();
    for (name, store) in stores.iter() {
        if category.is_some_and(|c| c != name) {
            continue;
        }
        for template in store.list() {
            rows.push(template_row(name, &template));
        }
    }
    if let Some(category) = category {
        // Surface unknown categories instead of printing an empty table
        stores.get(category)?;
    }

    if rows.is_empty() {
        println!("No templates found in {}", stores.root().display());
        return Ok(());
    }

    print_template_header();
    for row in rows {
        println!("{}", row);
    }
    Ok(())
}

/// Templates whose name contains `query`, across every category
pub fn search(stores: &CategoryStores, query: &str) -> Result<()> {
    let mut found = 0;
    for (name, store) in stores.iter() {
        for template in store.search(query) {
            if found == 0 {
                print_template_header();
            }
            println!("{}", template_row(name, &template));
            found += 1;
        }
    }

    if found == 0 {
        println!("No templates matching '{}'", style(query).yellow());
    }
    Ok(())
}

/// Details of one template; the latest version unless `version` is given
pub fn show(
    stores: &CategoryStores,
    name: &str,
    version: Option<&str>,
    category: Option<&str>,
) -> Result<()> {
    let category = category.unwrap_or(APPS);
    let store = stores.get(category)?;

    let template = match version {
        Some(version) => store.get(name, version),
        None => store.get_latest(name),
    };
    let template = template.ok_or_else(|| CliError::Template {
        message: format!(
            "template {}:{} not found in {}",
            name,
            version.unwrap_or("latest"),
            category
        ),
        help: Some(format!("Run `corral templates list --category {}`", category)),
    })?;

    print_template(&template);
    Ok(())
}
