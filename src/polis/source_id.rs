// Parsing of the polis identifiers and URLs.

use log::{debug, info};
use snafu::prelude::*;
use url::Url;

use crate::polis::*;

/// Report ids start with this character, conversation ids never do.
pub const REPORT_MARKER: char = 'r';
pub const DEFAULT_BASE_URL: &str = "https://pol.is";

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum IdKind {
    /// A frozen export of a conversation.
    Report,
    /// A live conversation.
    Conversation,
}

/// A resolved polis source: where to find it and what it is.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SourceIdentifier {
    base_url: String,
    polis_id: String,
    kind: IdKind,
}

impl SourceIdentifier {
    /// Classifies a raw id. Report ids start with 'r', conversation ids with a digit.
    pub fn from_id(polis_id: &str, base_url: Option<&str>) -> PolisResult<SourceIdentifier> {
        let kind = match polis_id.chars().next() {
            Some(REPORT_MARKER) => IdKind::Report,
            Some(c) if c.is_ascii_digit() => IdKind::Conversation,
            _ => return InvalidIdentifierSnafu { id: polis_id }.fail(),
        };
        Ok(SourceIdentifier {
            base_url: normalize_base_url(base_url.unwrap_or(DEFAULT_BASE_URL))?,
            polis_id: polis_id.to_string(),
            kind,
        })
    }

    /// Parses `https://polis.example.com/{conversation_id}` or
    /// `https://polis.example.com/report/{report_id}`.
    ///
    /// The report marker is added to report ids that lack it.
    pub fn from_url(polis_url: &str) -> PolisResult<SourceIdentifier> {
        let parsed = match Url::parse(polis_url) {
            Ok(u) => u,
            Err(e) => {
                return InvalidUrlSnafu {
                    url: polis_url,
                    reason: e.to_string(),
                }
                .fail()
            }
        };
        let host = parsed.host_str().context(InvalidUrlSnafu {
            url: polis_url,
            reason: "missing host",
        })?;
        let base_url = match parsed.port() {
            Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
            None => format!("{}://{}", parsed.scheme(), host),
        };

        let segments: Vec<&str> = parsed
            .path_segments()
            .map(|s| s.filter(|x| !x.is_empty()).collect())
            .unwrap_or_default();
        let last = *segments.last().context(InvalidUrlSnafu {
            url: polis_url,
            reason: "missing polis id",
        })?;

        let is_report = segments.len() >= 2 && segments[segments.len() - 2] == "report";
        let (polis_id, kind) = if is_report {
            if last.starts_with(REPORT_MARKER) {
                (last.to_string(), IdKind::Report)
            } else {
                (format!("{}{}", REPORT_MARKER, last), IdKind::Report)
            }
        } else {
            ensure!(
                !last.starts_with(REPORT_MARKER),
                ReportIdInConversationUrlSnafu { url: polis_url }
            );
            (last.to_string(), IdKind::Conversation)
        };
        debug!(
            "from_url: {} -> base {} id {} ({:?})",
            polis_url, base_url, polis_id, kind
        );
        Ok(SourceIdentifier {
            base_url,
            polis_id,
            kind,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn polis_id(&self) -> &str {
        &self.polis_id
    }

    pub fn kind(&self) -> IdKind {
        self.kind
    }
}

/// Lowercases the scheme and the host, keeps the port and any path prefix,
/// and drops the trailing slash.
fn normalize_base_url(base_url: &str) -> PolisResult<String> {
    let parsed = match Url::parse(base_url) {
        Ok(u) => u,
        Err(e) => {
            return InvalidUrlSnafu {
                url: base_url,
                reason: e.to_string(),
            }
            .fail()
        }
    };
    let host = parsed.host_str().context(InvalidUrlSnafu {
        url: base_url,
        reason: "missing host",
    })?;
    let mut res = match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    };
    res.push_str(parsed.path().trim_end_matches('/'));
    Ok(res)
}

/// Resolves the source parameters into an identifier.
///
/// A URL excludes the separate id and base URL. When an import directory is
/// going to be used, no identifier is required and a raw id is not classified:
/// the conversation id comes from the directory content.
pub fn resolve(
    polis_url: Option<&str>,
    polis_id: Option<&str>,
    base_url: Option<&str>,
    directory_pending: bool,
) -> PolisResult<Option<SourceIdentifier>> {
    if let Some(url) = polis_url {
        ensure!(
            polis_id.is_none() && base_url.is_none(),
            ConflictingSourceParamsSnafu { url }
        );
        return SourceIdentifier::from_url(url).map(Some);
    }
    match polis_id {
        Some(id) if directory_pending => {
            info!(
                "Ignoring polis id {}: the import directory takes precedence",
                id
            );
            Ok(None)
        }
        Some(id) => SourceIdentifier::from_id(id, base_url).map(Some),
        None if directory_pending => Ok(None),
        None => MissingIdentifierSnafu {}.fail(),
    }
}
