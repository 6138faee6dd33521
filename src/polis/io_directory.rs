use log::{debug, info};

use serde_json::Value as JSValue;
use std::path::Path;

use crate::polis::io_common::{records_from_json, RawDataset};
use crate::polis::io_geojson::read_json_file;
use crate::polis::*;

pub const COMMENTS_FILE: &str = "comments.json";
pub const VOTES_FILE: &str = "votes.json";
pub const MATH_FILE: &str = "math-pca2.json";
pub const CONVERSATION_FILE: &str = "conversation.json";

#[derive(PartialEq, Debug, Clone)]
pub struct DirectoryLoad {
    pub dataset: RawDataset,
    pub conversation_id: String,
}

/// Reads a local export of a conversation.
///
/// All four files must be present. The conversation id is taken from
/// conversation.json and may be written as a string or a number.
pub fn load_from_directory(dir: &Path) -> PolisResult<DirectoryLoad> {
    let path_of = |name: &str| dir.join(name).display().to_string();

    let comments_path = path_of(COMMENTS_FILE);
    let comments = records_from_json(read_json_file(&comments_path)?, &comments_path)?;
    let votes_path = path_of(VOTES_FILE);
    let votes = records_from_json(read_json_file(&votes_path)?, &votes_path)?;
    // Only checked for presence and validity.
    let math = read_json_file(&path_of(MATH_FILE))?;
    debug!("load_from_directory: math n = {:?}", math.get("n"));

    let conversation_path = path_of(CONVERSATION_FILE);
    let conversation = read_json_file(&conversation_path)?;
    let conversation_id = match conversation.get("conversation_id") {
        Some(JSValue::String(s)) if !s.is_empty() => s.clone(),
        Some(JSValue::Number(n)) => n.to_string(),
        _ => {
            return MissingConversationIdSnafu {
                path: conversation_path,
            }
            .fail()
        }
    };
    info!(
        "Imported conversation {} from {:?}: {} comments, {} votes",
        conversation_id,
        dir,
        comments.len(),
        votes.len()
    );
    Ok(DirectoryLoad {
        dataset: RawDataset { comments, votes },
        conversation_id,
    })
}
