use super::CommandContext;
use crate::cli::{MaterialsArgs, MaterialsCommands, OutputFormat};
use crate::error::Result;
use crate::output;
use asdkit::core::materials::{MaterialsDatabase, PropertyProvider};
use asdkit::core::models::substance::SubstanceKind;
use std::collections::BTreeMap;

pub fn run(args: MaterialsArgs, ctx: &CommandContext) -> Result<()> {
    let db = ctx.load_database()?;
    match args.command {
        MaterialsCommands::List { kind } => {
            let kinds = match kind {
                Some(kind) => vec![kind.parse()?],
                None => vec![SubstanceKind::Api, SubstanceKind::Polymer],
            };
            let listing = list(&db, &kinds);
            match ctx.format {
                OutputFormat::Json => output::print_json(&listing),
                OutputFormat::Table => {
                    for (kind, names) in &listing {
                        println!("{} ({}):", kind, names.len());
                        for name in names {
                            println!("  {}", name);
                        }
                    }
                    Ok(())
                }
            }
        }
        MaterialsCommands::Show { name, kind } => {
            let record = db.lookup(&name, kind.parse()?)?;
            match ctx.format {
                OutputFormat::Json => output::print_json(record.as_ref()),
                OutputFormat::Table => {
                    print!("{}", output::render_material(&record));
                    Ok(())
                }
            }
        }
    }
}

fn list(db: &MaterialsDatabase, kinds: &[SubstanceKind]) -> BTreeMap<SubstanceKind, Vec<String>> {
    kinds.iter().map(|&kind| (kind, db.names(kind))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_is_grouped_by_kind_and_sorted() {
        let db = MaterialsDatabase::new().unwrap();
        let listing = list(&db, &[SubstanceKind::Api, SubstanceKind::Polymer]);

        let apis = &listing[&SubstanceKind::Api];
        assert_eq!(apis.len(), db.len(SubstanceKind::Api));
        assert!(apis.contains(&"ibuprofen".to_string()));
        let mut sorted = apis.clone();
        sorted.sort_by_key(|name| name.to_lowercase());
        assert_eq!(apis, &sorted);

        let json = serde_json::to_value(&listing).unwrap();
        assert!(json["polymer"].as_array().unwrap().len() >= 8);
    }

    #[test]
    fn listing_a_single_kind_omits_the_other() {
        let db = MaterialsDatabase::new().unwrap();
        let listing = list(&db, &[SubstanceKind::Polymer]);
        assert_eq!(listing.len(), 1);
        assert!(listing.contains_key(&SubstanceKind::Polymer));
    }
}
