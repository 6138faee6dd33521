use clap::Parser;

/// Projects the participants of a Polis conversation onto a map.
///
/// Each participant is placed in the region their votes point to, or in the
/// "Other" area, and the result is written as a GeoJSON feature collection.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON configuration. The other options override its content.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (URL) The address of a conversation (https://pol.is/{id}) or of a report
    /// (https://pol.is/report/{id}). Cannot be combined with --polis-id or --base-url.
    #[clap(long, value_parser)]
    pub polis_url: Option<String>,

    /// A report id (starting with 'r') or a conversation id (starting with a digit).
    #[clap(long, value_parser)]
    pub polis_id: Option<String>,

    /// (default https://pol.is) The server hosting the polis id.
    #[clap(long, value_parser)]
    pub base_url: Option<String>,

    /// (directory) A local export with comments.json, votes.json, math-pca2.json and
    /// conversation.json. When set, nothing is downloaded.
    #[clap(short, long, value_parser)]
    pub import_dir: Option<String>,

    /// (default 7) The number of votes a participant needs to be shown.
    #[clap(long, value_parser)]
    pub min_votes: Option<usize>,

    /// (file path) The GeoJSON feature collection with the shape of each region.
    #[clap(short, long, value_parser)]
    pub geojson: Option<String>,

    /// (file path) Where to write the participants. '{polis_id}' is replaced by the
    /// loaded id.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (integer) The seed of the placement. By default, derived from the polis id.
    #[clap(long, value_parser)]
    pub seed: Option<u64>,

    /// (file path) A reference GeoJSON output. If provided, polisgeo checks that the
    /// written output matches it.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
