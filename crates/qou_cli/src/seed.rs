//! `qou seed`: loads the catalog CSVs into the index.

use qou_index::SearchIndexClient;
use qou_resource::load_resource;
use qou_service::Seeder;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::pipeline::Project;
use crate::GlobalArgs;

/// Runs `qou seed`.
///
/// Brands are derived from the packaged pattern artifact, so `qou build`
/// must have run first.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = Project::load(global)?;
    let config = &project.config;
    let artifact = load_resource(&project.resource_dir(), &config.package.name)?;
    let table = artifact.patterns()?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let report = rt.block_on(async {
        let client = SearchIndexClient::connect(config)?;
        let seeder = Seeder::new(
            client,
            &config.index.products_index,
            &config.index.suggestions_index,
            config.seed.batch_size,
            &table,
        );
        let products = seeder.read_catalog(
            &project.path(&config.seed.products),
            &project.path(&config.seed.aisles),
        )?;
        if !global.quiet {
            eprintln!("    Seeding {} products", products.len());
        }

        let cancel = CancellationToken::new();
        let ctrl_c = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, cancelling in-flight index requests");
                ctrl_c.cancel();
            }
        });
        Ok::<_, Box<dyn std::error::Error>>(seeder.seed(&products, &cancel).await?)
    })?;

    if !global.quiet {
        eprintln!(
            "   Finished {} products, {} suggestions ({} indices created)",
            report.products, report.suggestions, report.created_indices
        );
    }
    Ok(0)
}
