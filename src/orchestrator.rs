//! Turns documents into artifacts: one request per output type, each
//! dispatched to its own backend process.

use std::path::{Path, PathBuf};

use tokio::task::JoinSet;

use crate::document::RenderableDocument;
use crate::error::{ConversionError, Result};
use crate::protocol::{BackendConfig, BackendDriver};
use crate::request::{OutputType, RenderRequest};

/// Outcome of one output type in a batch.
#[derive(Debug)]
pub struct Conversion {
    pub output_type: OutputType,
    pub destination: PathBuf,
    pub result: Result<PathBuf>,
}

impl Conversion {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Clone)]
pub struct Converter {
    driver: BackendDriver,
}

impl Converter {
    pub fn new(driver: BackendDriver) -> Self {
        Self { driver }
    }

    pub fn with_config(config: BackendConfig) -> Self {
        Self::new(BackendDriver::new(config))
    }

    pub fn driver(&self) -> &BackendDriver {
        &self.driver
    }

    /// Render `document` as `output_type` into `destination`.
    ///
    /// Missing parent directories are created first. HTML is written
    /// directly; every other type goes through the backend.
    pub async fn convert(
        &self,
        document: &RenderableDocument,
        output_type: OutputType,
        destination: &Path,
    ) -> Result<PathBuf> {
        let request = RenderRequest::new(output_type, document, destination)?;
        self.dispatch(request).await
    }

    /// Carry out an already-built request.
    pub async fn dispatch(&self, request: RenderRequest) -> Result<PathBuf> {
        ensure_parent_dir(request.destination()).await?;

        let written = if request.output_type().needs_backend() {
            self.driver.start(&request).await?
        } else {
            let destination = request.destination();
            tokio::fs::write(destination, &request.payload().content)
                .await
                .map_err(|e| ConversionError::from_io(e, destination))?;
            destination.to_path_buf()
        };

        log::info!("Wrote {} ({})", written.display(), request.output_type());
        Ok(written)
    }

    /// Render `document` once per distinct type into
    /// `<out_dir>/<stem>.<ext>`.
    ///
    /// Requests run concurrently and independently; one failing does not
    /// stop the others. Outcomes come back in the order the types were
    /// first listed.
    pub async fn convert_all(
        &self,
        document: &RenderableDocument,
        types: &[OutputType],
        out_dir: &Path,
        stem: &str,
    ) -> Vec<Conversion> {
        let mut distinct: Vec<OutputType> = Vec::with_capacity(types.len());
        for ty in types {
            if !distinct.contains(ty) {
                distinct.push(*ty);
            }
        }

        let mut slots: Vec<Option<Result<PathBuf>>> = Vec::with_capacity(distinct.len());
        let mut tasks = JoinSet::new();
        for (index, output_type) in distinct.iter().copied().enumerate() {
            let destination = output_type.destination_in(out_dir, stem);
            match RenderRequest::new(output_type, document, &destination) {
                Ok(request) => {
                    slots.push(None);
                    let converter = self.clone();
                    tasks.spawn(async move { (index, converter.dispatch(request).await) });
                }
                Err(err) => {
                    log::error!("Cannot prepare {output_type} request: {err}");
                    slots.push(Some(Err(err)));
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => {
                    if let Err(err) = &result {
                        log::error!("{} conversion failed: {err}", distinct[index]);
                    }
                    slots[index] = Some(result);
                }
                Err(err) => log::error!("Conversion task aborted: {err}"),
            }
        }

        distinct
            .into_iter()
            .zip(slots)
            .map(|(output_type, slot)| Conversion {
                output_type,
                destination: output_type.destination_in(out_dir, stem),
                result: slot.unwrap_or_else(|| {
                    Err(ConversionError::unknown("TaskAborted", "conversion task did not complete"))
                }),
            })
            .collect()
    }
}

async fn ensure_parent_dir(destination: &Path) -> Result<()> {
    let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    if tokio::fs::metadata(parent).await.is_ok() {
        return Ok(());
    }
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| ConversionError::from_io(e, parent))?;
    log::debug!("Created output directory {}", parent.display());
    Ok(())
}
