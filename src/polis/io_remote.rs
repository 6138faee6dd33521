// Remote loading: the CSV export of a report, or the API of a live conversation.

use log::{debug, info, warn};
use snafu::{prelude::*, Snafu};

use serde_json::Value as JSValue;
use std::error::Error as StdError;
use std::time::Duration;

use crate::polis::io_common::{records_from_csv, records_from_json, RawDataset};
use crate::polis::source_id::{IdKind, SourceIdentifier};
use crate::polis::*;

/// A failed request. Transport failures are reduced to their message so that
/// they can be compared and replayed.
#[derive(Debug, Clone, PartialEq, Snafu)]
pub enum FetchError {
    #[snafu(display("TLS failure while requesting {url}: {message}"))]
    Tls { url: String, message: String },
    #[snafu(display("Request to {url} failed: {message}"))]
    Request { url: String, message: String },
    #[snafu(display("Request to {url} returned the status {status}"))]
    Status { url: String, status: u16 },
}

/// Retrieves the body of a URL as text.
pub trait Fetcher {
    fn get_text(&self, url: &str) -> Result<String, FetchError>;
}

/// The blocking HTTP client used outside of the tests.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> PolisResult<HttpFetcher> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context(HttpClientSnafu {})?;
        Ok(HttpFetcher { client })
    }
}

impl Fetcher for HttpFetcher {
    fn get_text(&self, url: &str) -> Result<String, FetchError> {
        debug!("get_text: {}", url);
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| classify(url, &e))?;
        let status = resp.status();
        if !status.is_success() {
            return StatusSnafu {
                url,
                status: status.as_u16(),
            }
            .fail();
        }
        resp.text().map_err(|e| classify(url, &e))
    }
}

// reqwest does not expose TLS failures as a kind. rustls reports them as an
// I/O error of kind InvalidData somewhere in the causes, only on https.
fn classify(url: &str, err: &reqwest::Error) -> FetchError {
    let mut messages: Vec<String> = Vec::new();
    let mut is_tls = false;
    let mut cause: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(c) = cause {
        messages.push(c.to_string());
        if let Some(io_err) = c.downcast_ref::<std::io::Error>() {
            is_tls |= io_err.kind() == std::io::ErrorKind::InvalidData;
        }
        cause = c.source();
    }
    let message = if messages.is_empty() {
        err.to_string()
    } else {
        messages.join(": ")
    };
    if is_tls && url.starts_with("https://") {
        FetchError::Tls {
            url: url.to_string(),
            message,
        }
    } else {
        FetchError::Request {
            url: url.to_string(),
            message,
        }
    }
}

/// The remote data, and how it was obtained.
#[derive(PartialEq, Debug, Clone)]
pub struct RemoteLoad {
    pub dataset: RawDataset,
    /// The base URL that served the data.
    pub base_url: String,
    pub downgraded: bool,
}

/// Loads a report or a conversation.
///
/// If the first request over HTTPS fails because of TLS, the whole load is
/// retried once over plain HTTP. Any other failure is returned as is.
pub fn load_remote<F: Fetcher + ?Sized>(
    fetcher: &F,
    source: &SourceIdentifier,
) -> PolisResult<RemoteLoad> {
    let base_url = source.base_url();
    match load_from_base(fetcher, base_url, source) {
        Err(PolisError::Transport {
            source: FetchError::Tls { url, message },
        }) if base_url.starts_with("https://") => {
            let http_base = format!("http://{}", &base_url["https://".len()..]);
            warn!(
                "TLS failure on {} ({}): retrying over the insecure transport {}",
                url, message, http_base
            );
            let dataset = load_from_base(fetcher, &http_base, source)?;
            Ok(RemoteLoad {
                dataset,
                base_url: http_base,
                downgraded: true,
            })
        }
        Err(e) => Err(e),
        Ok(dataset) => Ok(RemoteLoad {
            dataset,
            base_url: base_url.to_string(),
            downgraded: false,
        }),
    }
}

fn load_from_base<F: Fetcher + ?Sized>(
    fetcher: &F,
    base_url: &str,
    source: &SourceIdentifier,
) -> PolisResult<RawDataset> {
    match source.kind() {
        IdKind::Report => load_report(fetcher, base_url, source.polis_id()),
        IdKind::Conversation => load_conversation(fetcher, base_url, source.polis_id()),
    }
}

fn fetch<F: Fetcher + ?Sized>(fetcher: &F, url: &str) -> PolisResult<String> {
    fetcher.get_text(url).context(TransportSnafu {})
}

fn load_report<F: Fetcher + ?Sized>(
    fetcher: &F,
    base_url: &str,
    report_id: &str,
) -> PolisResult<RawDataset> {
    let comments_url = format!("{}/api/v3/reportExport/{}/comments.csv", base_url, report_id);
    let comments = records_from_csv(&fetch(fetcher, &comments_url)?, &comments_url)?;
    let votes_url = format!("{}/api/v3/reportExport/{}/votes.csv", base_url, report_id);
    let votes = records_from_csv(&fetch(fetcher, &votes_url)?, &votes_url)?;
    info!(
        "Report {}: {} comments, {} votes",
        report_id,
        comments.len(),
        votes.len()
    );
    Ok(RawDataset { comments, votes })
}

fn fetch_json<F: Fetcher + ?Sized>(fetcher: &F, url: &str) -> PolisResult<JSValue> {
    let body = fetch(fetcher, url)?;
    serde_json::from_str(&body).context(ParsingJsonSnafu { path: url })
}

fn load_conversation<F: Fetcher + ?Sized>(
    fetcher: &F,
    base_url: &str,
    conversation_id: &str,
) -> PolisResult<RawDataset> {
    let comments_url = format!(
        "{}/api/v3/comments?conversation_id={}&moderation=true&include_voting_patterns=true",
        base_url, conversation_id
    );
    let comments = records_from_json(fetch_json(fetcher, &comments_url)?, &comments_url)?;

    // The participant count is only known from the math endpoint.
    let math_url = format!("{}/api/v3/math/pca2?conversation_id={}", base_url, conversation_id);
    let math = fetch_json(fetcher, &math_url)?;
    let n = math
        .get("n")
        .and_then(|n| n.as_u64())
        .context(UnexpectedJsonSnafu {
            path: math_url.as_str(),
            expected: "a participant count \"n\"",
        })?;

    let mut votes = Vec::new();
    for pid in 0..n {
        let votes_url = format!(
            "{}/api/v3/votes?conversation_id={}&pid={}",
            base_url, conversation_id, pid
        );
        let mut v = records_from_json(fetch_json(fetcher, &votes_url)?, &votes_url)?;
        votes.append(&mut v);
    }
    info!(
        "Conversation {}: {} comments, {} participants, {} votes",
        conversation_id,
        comments.len(),
        n,
        votes.len()
    );
    Ok(RawDataset { comments, votes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polis::test_support::ScriptedFetcher;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    const COMMENTS_CSV: &str =
        "timestamp,datetime,comment-id,author-id,agrees,disagrees,moderated,comment-body\n1,x,64,0,1,0,1,Orcas\n";
    const VOTES_CSV: &str = "timestamp,datetime,comment-id,voter-id,vote\n1,x,64,3,1\n";

    fn report(base: &str) -> SourceIdentifier {
        SourceIdentifier::from_id("r2abc", Some(base)).unwrap()
    }

    #[test]
    fn report_over_https() {
        let fetcher = ScriptedFetcher::default()
            .with_body("https://pol.is/api/v3/reportExport/r2abc/comments.csv", COMMENTS_CSV)
            .with_body("https://pol.is/api/v3/reportExport/r2abc/votes.csv", VOTES_CSV);
        let r = load_remote(&fetcher, &report("https://pol.is")).unwrap();
        assert!(!r.downgraded);
        assert_eq!(r.base_url, "https://pol.is");
        assert_eq!(r.dataset.comments.len(), 1);
        assert_eq!(r.dataset.votes.len(), 1);
    }

    #[test]
    fn tls_failure_downgrades_once() {
        let fetcher = ScriptedFetcher {
            tls_broken: true,
            ..Default::default()
        }
        .with_body("http://pol.is/api/v3/reportExport/r2abc/comments.csv", COMMENTS_CSV)
        .with_body("http://pol.is/api/v3/reportExport/r2abc/votes.csv", VOTES_CSV);
        let r = load_remote(&fetcher, &report("https://pol.is")).unwrap();
        assert!(r.downgraded);
        assert_eq!(r.base_url, "http://pol.is");
        assert_eq!(
            fetcher.requested(),
            vec![
                "https://pol.is/api/v3/reportExport/r2abc/comments.csv",
                "http://pol.is/api/v3/reportExport/r2abc/comments.csv",
                "http://pol.is/api/v3/reportExport/r2abc/votes.csv",
            ]
        );
    }

    #[test]
    fn uppercase_scheme_still_downgrades() {
        let fetcher = ScriptedFetcher {
            tls_broken: true,
            ..Default::default()
        }
        .with_body("http://pol.is/api/v3/reportExport/r2abc/comments.csv", COMMENTS_CSV)
        .with_body("http://pol.is/api/v3/reportExport/r2abc/votes.csv", VOTES_CSV);
        let r = load_remote(&fetcher, &report("HTTPS://Pol.IS/")).unwrap();
        assert!(r.downgraded);
        assert_eq!(r.base_url, "http://pol.is");
    }

    #[test]
    fn other_failures_are_not_retried() {
        let fetcher = ScriptedFetcher::default();
        let res = load_remote(&fetcher, &report("https://pol.is"));
        assert!(matches!(
            res,
            Err(PolisError::Transport {
                source: FetchError::Status { status: 404, .. }
            })
        ));
        assert_eq!(fetcher.requested().len(), 1);
    }

    #[test]
    fn failure_after_downgrade_propagates() {
        let mut fetcher = ScriptedFetcher {
            tls_broken: true,
            ..Default::default()
        }
        .with_body("http://pol.is/api/v3/reportExport/r2abc/comments.csv", COMMENTS_CSV);
        fetcher.failures.insert(
            "http://pol.is/api/v3/reportExport/r2abc/votes.csv".to_string(),
            FetchError::Request {
                url: "http://pol.is/api/v3/reportExport/r2abc/votes.csv".to_string(),
                message: "connection reset".to_string(),
            },
        );
        let res = load_remote(&fetcher, &report("https://pol.is"));
        assert!(matches!(
            res,
            Err(PolisError::Transport {
                source: FetchError::Request { .. }
            })
        ));
        assert_eq!(fetcher.requested().len(), 3);
    }

    #[test]
    fn plain_http_is_not_retried() {
        let mut fetcher = ScriptedFetcher::default();
        let url = "http://pol.is/api/v3/reportExport/r2abc/comments.csv";
        fetcher.failures.insert(
            url.to_string(),
            FetchError::Tls {
                url: url.to_string(),
                message: "handshake".to_string(),
            },
        );
        let res = load_remote(&fetcher, &report("http://pol.is"));
        assert!(matches!(
            res,
            Err(PolisError::Transport {
                source: FetchError::Tls { .. }
            })
        ));
        assert_eq!(fetcher.requested(), vec![url]);
    }

    #[test]
    fn conversation_reads_every_participant() {
        let fetcher = ScriptedFetcher::default()
            .with_body(
                "https://pol.is/api/v3/comments?conversation_id=4abc&moderation=true&include_voting_patterns=true",
                r#"[{"tid": 65, "txt": "Lopez"}]"#,
            )
            .with_body("https://pol.is/api/v3/math/pca2?conversation_id=4abc", r#"{"n": 2}"#)
            .with_body(
                "https://pol.is/api/v3/votes?conversation_id=4abc&pid=0",
                r#"[{"pid": 0, "tid": 65, "vote": -1}]"#,
            )
            .with_body(
                "https://pol.is/api/v3/votes?conversation_id=4abc&pid=1",
                r#"[{"pid": 1, "tid": 65, "vote": 1}, {"pid": 1, "tid": 66, "vote": 0}]"#,
            );
        let convo = SourceIdentifier::from_id("4abc", None).unwrap();
        let r = load_remote(&fetcher, &convo).unwrap();
        assert_eq!(r.dataset.comments.len(), 1);
        assert_eq!(r.dataset.votes.len(), 3);
        assert_eq!(fetcher.requested().len(), 4);
    }

    #[test]
    fn math_without_count() {
        let fetcher = ScriptedFetcher::default()
            .with_body(
                "https://pol.is/api/v3/comments?conversation_id=4abc&moderation=true&include_voting_patterns=true",
                "[]",
            )
            .with_body("https://pol.is/api/v3/math/pca2?conversation_id=4abc", "{}");
        let convo = SourceIdentifier::from_id("4abc", None).unwrap();
        assert!(matches!(
            load_remote(&fetcher, &convo),
            Err(PolisError::UnexpectedJson { .. })
        ));
    }

    // Answers `connections` connections with the same plain HTTP response.
    fn serve(response: &'static str, connections: usize) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        thread::spawn(move || {
            for _ in 0..connections {
                if let Ok((mut stream, _)) = listener.accept() {
                    let mut buf = [0u8; 4096];
                    let _ = stream.read(&mut buf);
                    let _ = stream.write_all(response.as_bytes());
                }
            }
        });
        port
    }

    fn http_fetcher() -> HttpFetcher {
        HttpFetcher::new(Duration::from_secs(10)).unwrap()
    }

    const CSV_RESPONSE: &str =
        "HTTP/1.1 200 OK\r\nContent-Length: 8\r\nConnection: close\r\n\r\na,b\n1,2\n";

    #[test]
    fn plain_server_behind_https_is_a_tls_failure() {
        let port = serve(CSV_RESPONSE, 1);
        let res = http_fetcher().get_text(&format!("https://127.0.0.1:{}/api/v3/math/pca2", port));
        assert!(matches!(res, Err(FetchError::Tls { .. })), "{:?}", res);
    }

    #[test]
    fn refused_connection_is_not_a_tls_failure() {
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        // The words of the URL play no part in the classification.
        let url = format!(
            "https://127.0.0.1:{}/api/v3/reportExport/r2ssl/comments.csv",
            port
        );
        let res = http_fetcher().get_text(&url);
        assert!(matches!(res, Err(FetchError::Request { .. })), "{:?}", res);
    }

    #[test]
    fn plain_http_body_and_status() {
        let port = serve(CSV_RESPONSE, 1);
        let body = http_fetcher()
            .get_text(&format!("http://127.0.0.1:{}/x", port))
            .unwrap();
        assert_eq!(body, "a,b\n1,2\n");

        let port = serve(
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            1,
        );
        let res = http_fetcher().get_text(&format!("http://127.0.0.1:{}/x", port));
        assert!(matches!(res, Err(FetchError::Status { status: 404, .. })), "{:?}", res);
    }

    #[test]
    fn http_client_downgrades_from_a_plain_server() {
        // One failed handshake, then comments and votes over HTTP.
        let port = serve(CSV_RESPONSE, 3);
        let base = format!("https://127.0.0.1:{}", port);
        let source = SourceIdentifier::from_id("r2abc", Some(&base)).unwrap();
        let r = load_remote(&http_fetcher(), &source).unwrap();
        assert!(r.downgraded);
        assert_eq!(r.base_url, format!("http://127.0.0.1:{}", port));
        assert_eq!(r.dataset.votes.len(), 1);
    }
}
