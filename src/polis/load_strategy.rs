use log::info;
use snafu::prelude::*;

use std::path::PathBuf;

use crate::polis::io_common::RawDataset;
use crate::polis::io_directory::load_from_directory;
use crate::polis::io_remote::{load_remote, Fetcher};
use crate::polis::source_id::{IdKind, SourceIdentifier};
use crate::polis::*;

/// The one way the data is going to be loaded.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum LoadRequest {
    /// A local export with comments.json, votes.json, math-pca2.json and conversation.json.
    FromDirectory(PathBuf),
    /// The CSV export of a report.
    FromReport(SourceIdentifier),
    /// The API of a live conversation.
    FromConversation(SourceIdentifier),
}

/// The loaded data, with the id it is known under from now on.
#[derive(PartialEq, Debug, Clone)]
pub struct LoadedData {
    pub dataset: RawDataset,
    /// The report or conversation id. For a directory, the conversation id
    /// declared in its content.
    pub polis_id: String,
    /// True if the secure transport failed and the data came over plain HTTP.
    pub downgraded: bool,
}

/// Picks the loading strategy. An import directory always wins over an identifier.
pub fn select(
    identifier: Option<SourceIdentifier>,
    directory: Option<PathBuf>,
) -> PolisResult<LoadRequest> {
    if let Some(dir) = directory {
        if let Some(id) = identifier {
            info!(
                "Both an import directory and the polis id {} are set: using the directory {:?}",
                id.polis_id(),
                dir
            );
        }
        return Ok(LoadRequest::FromDirectory(dir));
    }
    let identifier = identifier.context(NoLoadTargetSnafu {})?;
    Ok(match identifier.kind() {
        IdKind::Report => LoadRequest::FromReport(identifier),
        IdKind::Conversation => LoadRequest::FromConversation(identifier),
    })
}

impl LoadRequest {
    pub fn load<F: Fetcher + ?Sized>(&self, fetcher: &F) -> PolisResult<LoadedData> {
        match self {
            LoadRequest::FromDirectory(dir) => {
                let d = load_from_directory(dir)?;
                Ok(LoadedData {
                    dataset: d.dataset,
                    polis_id: d.conversation_id,
                    downgraded: false,
                })
            }
            LoadRequest::FromReport(source) | LoadRequest::FromConversation(source) => {
                let r = load_remote(fetcher, source)?;
                Ok(LoadedData {
                    dataset: r.dataset,
                    polis_id: source.polis_id().to_string(),
                    downgraded: r.downgraded,
                })
            }
        }
    }
}
