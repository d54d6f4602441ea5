//! Wave 2: professions, sub-professions and tags.
//!
//! None of these have a document of their own; they are collected from the
//! character records.

use std::collections::{BTreeMap, BTreeSet};

use super::{entries, Records, StageContext};
use crate::error::StoreError;
use crate::parser::record::{array, text};
use crate::parser::Row;
use crate::registry::EntityKind;

/// Distinct taxonomy codes found in a character document
#[derive(Debug, Default, PartialEq)]
pub struct Taxonomy {
    /// code -> first display name seen for it
    pub professions: BTreeMap<String, Option<String>>,
    pub sub_professions: BTreeSet<String>,
    pub tags: BTreeSet<String>,
}

pub fn scan(records: &Records) -> Taxonomy {
    let mut taxonomy = Taxonomy::default();

    for (_, record) in entries(records).filter(|(_, r)| r.is_object()) {
        if let Some(code) = text(record, "profession") {
            let named = taxonomy.professions.entry(code).or_default();
            if named.is_none() {
                *named = text(record, "professionName");
            }
        }

        if let Some(code) = text(record, "subProfessionId") {
            taxonomy.sub_professions.insert(code);
        }

        for tag in array(record, "tagList") {
            match tag.as_str() {
                Some(t) if !t.is_empty() => {
                    taxonomy.tags.insert(t.to_string());
                }
                _ => {}
            }
        }
    }

    taxonomy
}

pub fn load(records: &Records, ctx: &mut StageContext<'_>) -> Result<(), StoreError> {
    let taxonomy = scan(records);

    // Professions without a display name are named by their code
    for (code, name) in &taxonomy.professions {
        ctx.ensure(EntityKind::Profession, code, |code| {
            Row::new()
                .with("profession_code", code)
                .with("name", name.as_deref().unwrap_or(code))
        })?;
    }

    for code in &taxonomy.sub_professions {
        ctx.ensure(EntityKind::SubProfession, code, |code| {
            Row::new()
                .with("sub_profession_code", code)
                .with("name", code)
        })?;
    }

    for tag in &taxonomy.tags {
        ctx.ensure(EntityKind::Tag, tag, |tag| Row::new().with("tag_name", tag))?;
    }

    Ok(())
}
