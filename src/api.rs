use anyhow::{Context, Result};

#[cfg(feature = "reqwest")]
use once_cell::sync::OnceCell;
#[cfg(feature = "reqwest")]
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapConnectionEnd {
    pub room: usize,
    pub door: usize,
}

/// One undirected door pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapConnection {
    pub from: MapConnectionEnd,
    pub to: MapConnectionEnd,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Map {
    pub rooms: Vec<u8>,
    #[serde(rename = "startingRoom")]
    pub starting_room: usize,
    pub connections: Vec<MapConnection>,
}

/// Parses either a bare map or a `{"map": ...}` document (the shape `/guess`
/// takes and the simulator dumps).
pub fn parse_map_json(s: &str) -> Result<Map> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MapDocument {
        Wrapped { map: Map },
        Bare(Map),
    }
    let doc: MapDocument = serde_json::from_str(s).context("Failed to parse map JSON")?;
    Ok(match doc {
        MapDocument::Wrapped { map } => map,
        MapDocument::Bare(map) => map,
    })
}

#[cfg(feature = "reqwest")]
const AEDIFICIUM_BASE_URL: &str = "https://31pwr5t6ij.execute-api.eu-west-2.amazonaws.com";

#[cfg(feature = "reqwest")]
fn base_url() -> String {
    std::env::var("AEDIFICIUM_URL").unwrap_or_else(|_| AEDIFICIUM_BASE_URL.to_string())
}

/// Team id, read once from `AEDIFICIUM_ID`.
#[cfg(feature = "reqwest")]
pub fn get_id() -> Result<String> {
    static ID_CACHE: OnceCell<String> = OnceCell::new();
    ID_CACHE
        .get_or_try_init(|| std::env::var("AEDIFICIUM_ID").context("AEDIFICIUM_ID not set"))
        .cloned()
}

#[cfg(feature = "reqwest")]
fn post<Req: Serialize, Res: serde::de::DeserializeOwned>(endpoint: &str, req: &Req) -> Result<Res> {
    let client = Client::new();
    let url = format!("{}/{}", base_url(), endpoint);
    let res = client
        .post(url)
        .json(req)
        .send()
        .with_context(|| format!("Failed to POST /{}", endpoint))?;

    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().unwrap_or_default();
        anyhow::bail!("/{} returned {}: {}", endpoint, status, body);
    }

    res.json()
        .with_context(|| format!("Failed to parse /{} response", endpoint))
}

#[cfg(feature = "reqwest")]
#[derive(Serialize)]
struct SelectRequest<'a> {
    id: &'a str,
    #[serde(rename = "problemName")]
    problem_name: &'a str,
}

#[cfg(feature = "reqwest")]
#[derive(Deserialize)]
struct SelectResponse {
    #[serde(rename = "problemName")]
    problem_name: String,
}

/// POST /select to choose a problem to solve.
/// Returns the `problemName` echoed by the service.
#[cfg(feature = "reqwest")]
pub fn select(problem_name: &str) -> Result<String> {
    let id = get_id()?;
    let body: SelectResponse = post(
        "select",
        &SelectRequest {
            id: id.as_str(),
            problem_name,
        },
    )?;
    Ok(body.problem_name)
}

#[cfg(feature = "reqwest")]
#[derive(Serialize)]
struct ExploreRequest<'a> {
    id: &'a str,
    plans: &'a [String],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExploreResponse {
    pub results: Vec<Vec<u8>>,
    #[serde(rename = "queryCount")]
    pub query_count: u64,
}

/// POST /explore with one or more route plans in their text encoding.
#[cfg(feature = "reqwest")]
pub fn explore(plans: &[String]) -> Result<ExploreResponse> {
    let id = get_id()?;
    post(
        "explore",
        &ExploreRequest {
            id: id.as_str(),
            plans,
        },
    )
}

#[cfg(feature = "reqwest")]
#[derive(Serialize)]
struct GuessRequest<'a> {
    id: &'a str,
    map: &'a Map,
}

#[cfg(feature = "reqwest")]
#[derive(Deserialize)]
struct GuessResponse {
    correct: bool,
}

/// POST /guess to submit a candidate map. Returns whether it is correct.
#[cfg(feature = "reqwest")]
pub fn guess(map: &Map) -> Result<bool> {
    let id = get_id()?;
    let body: GuessResponse = post("guess", &GuessRequest { id: id.as_str(), map })?;
    Ok(body.correct)
}
