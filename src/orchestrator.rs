//! The style pipeline.
//!
//! For every image under the source folder: download it, refresh its backup
//! under `<output>/original/`, then render each catalog style into
//! `<output>/<style>/` unless that output already exists. Problems with a
//! single file or style are recorded in the [`ProcessingOutcome`]; only a
//! missing container or an unusable store aborts the run.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::blob_store::BlobStore;
use crate::error::{Result, StylizerError};
use crate::generator::ImageGenerator;
use crate::outcome::ProcessingOutcome;
use crate::paths;
use crate::styles::{StyleCatalog, StyleDefinition};

pub const CONFIGURATION_MISSING: &str = "configuration missing";

pub struct Orchestrator {
    store: Arc<dyn BlobStore>,
    generator: Option<Arc<dyn ImageGenerator>>,
    catalog: Arc<StyleCatalog>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn BlobStore>,
        generator: Option<Arc<dyn ImageGenerator>>,
        catalog: Arc<StyleCatalog>,
    ) -> Self {
        Self {
            store,
            generator,
            catalog,
        }
    }

    pub async fn run(
        &self,
        container: &str,
        source_folder: &str,
        output_folder: &str,
    ) -> Result<ProcessingOutcome> {
        if !self.store.container_exists(container).await? {
            return Err(StylizerError::NotFound(format!(
                "Container '{}' does not exist",
                container
            )));
        }

        let listed = self.store.list(container, source_folder).await?;
        let sources: Vec<String> = listed
            .into_iter()
            .filter(|path| !paths::is_directory_marker(path) && paths::is_supported_image(path))
            .collect();

        info!(
            container,
            source_folder,
            output_folder,
            images = sources.len(),
            styles = self.catalog.len(),
            "Starting style run"
        );

        let mut outcome = ProcessingOutcome::new();
        for source in &sources {
            self.process_source(container, source, output_folder, &mut outcome)
                .await;
        }

        info!(
            container,
            processed = outcome.processed.len(),
            skipped = outcome.skipped.len(),
            failed = outcome.failed.len(),
            "Style run finished"
        );
        Ok(outcome)
    }

    async fn process_source(
        &self,
        container: &str,
        source: &str,
        output_folder: &str,
        outcome: &mut ProcessingOutcome,
    ) {
        let file_name = paths::file_name(source);
        info!(source, "Processing image");

        let original = match self.store.download(container, source).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(source, error = %e, "Download failed");
                outcome.record_failed(source, format!("download failed: {}", e));
                return;
            }
        };

        let backup = paths::backup_path(output_folder, file_name);
        if let Err(e) = self
            .store
            .upload(container, &backup, original.clone(), true)
            .await
        {
            warn!(source, backup = %backup, error = %e, "Backup failed");
            outcome.record_failed(backup, format!("backup failed: {}", e));
            return;
        }
        debug!(backup = %backup, "Backup written");

        for style in self.catalog.iter() {
            self.apply_style(container, &original, file_name, output_folder, style, outcome)
                .await;
        }
    }

    async fn apply_style(
        &self,
        container: &str,
        original: &Bytes,
        file_name: &str,
        output_folder: &str,
        style: &StyleDefinition,
        outcome: &mut ProcessingOutcome,
    ) {
        let target = paths::styled_path(output_folder, &style.name, file_name);

        match self.store.exists(container, &target).await {
            Ok(true) => {
                debug!(target = %target, "Styled output already exists");
                outcome.record_skipped(target);
                return;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(target = %target, error = %e, "Existence check failed");
                outcome.record_failed(target, format!("existence check failed: {}", e));
                return;
            }
        }

        let Some(generator) = &self.generator else {
            outcome.record_failed(target, CONFIGURATION_MISSING);
            return;
        };

        let styled = match generator
            .generate(original, file_name, &style.instruction)
            .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(target = %target, style = %style.name, error = %e, "Generation failed");
                outcome.record_failed(target, e);
                return;
            }
        };

        match self
            .store
            .upload(container, &target, Bytes::from(styled), true)
            .await
        {
            Ok(()) => {
                info!(target = %target, style = %style.name, "Styled image written");
                outcome.record_processed(target);
            }
            Err(e) => {
                warn!(target = %target, error = %e, "Upload failed");
                outcome.record_failed(target, format!("upload failed: {}", e));
            }
        }
    }
}
