use anyhow::{anyhow, bail, Result};
use tracing::info;

use crate::loaders::Loader;
use crate::schema::DependencyResolver;

/// Resolves which loaders to run based on include/exclude filters.
///
/// Unlike tables in a fresh database, loaders are not pulled in for their
/// dependencies: a partial run reads earlier entities back from the store.
pub fn resolve_loaders(
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
) -> Result<Vec<Loader>> {
    let selected = match (include, exclude) {
        (Some(_), Some(_)) => {
            bail!("Cannot use both --include and --exclude at the same time");
        }
        (Some(include_list), None) => {
            let wanted = parse_names(&include_list)?;
            Loader::ALL
                .into_iter()
                .filter(|l| wanted.contains(l))
                .collect()
        }
        (None, Some(exclude_list)) => {
            let unwanted = parse_names(&exclude_list)?;
            Loader::ALL
                .into_iter()
                .filter(|l| !unwanted.contains(l))
                .collect()
        }
        (None, None) => Loader::ALL.to_vec(),
    };

    let names: Vec<&str> = selected.iter().map(|l| l.name()).collect();
    info!(loaders = ?names, "selected {} of {} loaders", selected.len(), Loader::ALL.len());

    let from_store = store_dependencies(&selected)?;
    if !from_store.is_empty() {
        info!(tables = ?from_store, "reading these tables from the existing store");
    }

    Ok(selected)
}

/// Tables the selected loaders reference but do not write themselves
pub fn store_dependencies(loaders: &[Loader]) -> Result<Vec<&'static str>> {
    let written: Vec<&str> = loaders
        .iter()
        .flat_map(|l| l.tables().iter().map(|t| t.name))
        .collect();

    let ancestors = DependencyResolver::new()
        .ancestors(&written)
        .map_err(|e| anyhow!(e))?;

    Ok(ancestors.into_iter().collect())
}

fn parse_names(names: &[String]) -> Result<Vec<Loader>> {
    names
        .iter()
        .map(|name| {
            Loader::from_name(name.trim()).ok_or_else(|| {
                let known: Vec<&str> = Loader::ALL.iter().map(|l| l.name()).collect();
                anyhow!("Unknown loader `{}` (known: {})", name, known.join(", "))
            })
        })
        .collect()
}
