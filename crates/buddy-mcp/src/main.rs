use buddy_core::{
    feed, seed, settings, ActivityDraft, ActivityService, BuddyError, FeedFilter, Identity,
    IdentityGate, Outcome, Permissions, RatingService, SessionStore, SharedStore,
};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// --- Request types ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SignInRequest {
    /// Institutional email address, e.g. "name@ug.bilkent.edu.tr". Case and surrounding spaces are ignored.
    email: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ListActivitiesRequest {
    /// Email of the acting user
    actor: String,
    /// One of "all", "active", "completed", "mine", "joined". Anything else lists all.
    filter: Option<String>,
    /// Case-insensitive substring matched against title and location
    search: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ActivityRequest {
    /// Email of the acting user
    actor: String,
    /// ID of the activity (e.g. "act-3f2a...")
    activity_id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct CreateActivityRequest {
    /// Email of the acting user; becomes the creator and first participant
    actor: String,
    activity: ActivityDraft,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct UpdateActivityRequest {
    /// Email of the acting user; must be the creator
    actor: String,
    /// ID of the activity to edit
    activity_id: String,
    /// Replacement values for title, location, time, notes and maxParticipants
    activity: ActivityDraft,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct RateUserRequest {
    /// Email of the acting user; must have taken part in the activity
    actor: String,
    /// ID of a completed activity
    activity_id: String,
    /// Email of the participant being rated
    target: String,
    /// 1 to 5. Numeric strings are accepted.
    #[serde(default, deserialize_with = "buddy_core::loose_integer")]
    stars: Option<i64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct RatingStatsRequest {
    /// Email of the user whose received ratings are aggregated
    email: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SeedRequest {
    /// Email of the acting user; one demo activity is hosted by them and one completed activity includes them
    actor: String,
}

// --- Response shapes ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ActivityDetail<'a> {
    activity: &'a buddy_core::Activity,
    permissions: Permissions,
    rateable_users: Vec<&'a Identity>,
    already_rated: Vec<Identity>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsView {
    email: Identity,
    average: Option<f64>,
    display_average: Option<String>,
    count: usize,
}

// --- Server ---

#[derive(Clone)]
pub struct BuddyServer {
    tool_router: ToolRouter<Self>,
    store: SharedStore,
    gate: IdentityGate,
    activities: ActivityService,
    ratings: RatingService,
    sessions: SessionStore,
}

#[tool_router]
impl BuddyServer {
    pub fn new(store: SharedStore, gate: IdentityGate) -> Self {
        Self {
            tool_router: Self::tool_router(),
            activities: ActivityService::new(store.clone()),
            ratings: RatingService::new(store.clone()),
            sessions: SessionStore::new(store.clone()),
            store,
            gate,
        }
    }

    /// Validate the acting identity, or produce the tool error to return.
    fn actor(&self, raw: &str) -> Result<Identity, CallToolResult> {
        self.gate.validate(raw).map_err(|e| failure(&e))
    }

    #[tool(description = "Sign in with an institutional email. Validates the address, stores it as this device's session, and returns the normalized identity to pass as `actor` to other tools.")]
    fn sign_in(
        &self,
        Parameters(req): Parameters<SignInRequest>,
    ) -> Result<CallToolResult, McpError> {
        match self.sessions.sign_in(&self.gate, &req.email) {
            Ok(identity) => Ok(CallToolResult::success(vec![Content::text(format!(
                "Signed in as {}",
                identity
            ))])),
            Err(e) => Ok(failure(&e)),
        }
    }

    #[tool(description = "Sign out: clear the stored session.")]
    fn sign_out(&self) -> Result<CallToolResult, McpError> {
        match self.sessions.sign_out() {
            Ok(()) => Ok(CallToolResult::success(vec![Content::text("Signed out.")])),
            Err(e) => Ok(failure(&e)),
        }
    }

    #[tool(description = "Show the signed-in identity stored for this device, if any.")]
    fn current_session(&self) -> Result<CallToolResult, McpError> {
        let text = match self.sessions.current(&self.gate) {
            Some(identity) => identity.to_string(),
            None => "No session. Use sign_in first.".to_string(),
        };
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    #[tool(description = "List the activity feed, newest first. Returns {count, activities: [{id, title, location, time, notes, maxParticipants, creatorEmail, participants, status, createdAt}]}.")]
    fn list_activities(
        &self,
        Parameters(req): Parameters<ListActivitiesRequest>,
    ) -> Result<CallToolResult, McpError> {
        let actor = match self.actor(&req.actor) {
            Ok(a) => a,
            Err(err) => return Ok(err),
        };
        let filter = req.filter.as_deref().map(FeedFilter::parse).unwrap_or_default();
        let all = self.activities.list();
        let shown = feed::project(&all, &actor, filter, req.search.as_deref().unwrap_or(""));
        let body = serde_json::json!({
            "count": shown.len(),
            "activities": shown,
        });
        Ok(CallToolResult::success(vec![Content::text(pretty(&body))]))
    }

    #[tool(description = "Get one activity with what the actor may do on it: {activity, permissions: {canJoin, canLeave, canComplete, canEdit, canDelete}, rateableUsers, alreadyRated}.")]
    fn get_activity(
        &self,
        Parameters(req): Parameters<ActivityRequest>,
    ) -> Result<CallToolResult, McpError> {
        let actor = match self.actor(&req.actor) {
            Ok(a) => a,
            Err(err) => return Ok(err),
        };
        let Some(activity) = self.activities.get(&req.activity_id) else {
            return Ok(failure(&BuddyError::NotFound));
        };
        let detail = ActivityDetail {
            permissions: Permissions::for_actor(&activity, &actor),
            rateable_users: feed::rateable_participants(&activity, &actor),
            already_rated: self
                .ratings
                .given_by(&actor, &activity.id)
                .into_iter()
                .map(|r| r.to)
                .collect(),
            activity: &activity,
        };
        Ok(CallToolResult::success(vec![Content::text(pretty(&detail))]))
    }

    #[tool(description = "Create an activity. The actor becomes its creator and first participant. Title, location and time are required; maxParticipants must be 2-50.")]
    fn create_activity(
        &self,
        Parameters(req): Parameters<CreateActivityRequest>,
    ) -> Result<CallToolResult, McpError> {
        let actor = match self.actor(&req.actor) {
            Ok(a) => a,
            Err(err) => return Ok(err),
        };
        Ok(respond(
            self.activities.create(&actor, &req.activity),
            "Activity added.",
        ))
    }

    #[tool(description = "Edit an active activity's title, location, time, notes and maxParticipants. Creator only; maxParticipants cannot drop below the current participant count.")]
    fn update_activity(
        &self,
        Parameters(req): Parameters<UpdateActivityRequest>,
    ) -> Result<CallToolResult, McpError> {
        let actor = match self.actor(&req.actor) {
            Ok(a) => a,
            Err(err) => return Ok(err),
        };
        Ok(respond(
            self.activities.update(&actor, &req.activity_id, &req.activity),
            "Activity updated.",
        ))
    }

    #[tool(description = "Delete an activity. Creator only; allowed for active and completed activities.")]
    fn delete_activity(
        &self,
        Parameters(req): Parameters<ActivityRequest>,
    ) -> Result<CallToolResult, McpError> {
        let actor = match self.actor(&req.actor) {
            Ok(a) => a,
            Err(err) => return Ok(err),
        };
        Ok(respond(
            self.activities.delete(&actor, &req.activity_id),
            "Activity deleted.",
        ))
    }

    #[tool(description = "Join an active activity that still has room.")]
    fn join_activity(
        &self,
        Parameters(req): Parameters<ActivityRequest>,
    ) -> Result<CallToolResult, McpError> {
        let actor = match self.actor(&req.actor) {
            Ok(a) => a,
            Err(err) => return Ok(err),
        };
        Ok(respond(
            self.activities.join(&actor, &req.activity_id),
            "Joined the activity.",
        ))
    }

    #[tool(description = "Leave an active activity. The creator cannot leave their own activity.")]
    fn leave_activity(
        &self,
        Parameters(req): Parameters<ActivityRequest>,
    ) -> Result<CallToolResult, McpError> {
        let actor = match self.actor(&req.actor) {
            Ok(a) => a,
            Err(err) => return Ok(err),
        };
        Ok(respond(
            self.activities.leave(&actor, &req.activity_id),
            "Left the activity.",
        ))
    }

    #[tool(description = "Mark an activity as completed. Creator only and irreversible; afterwards participants can rate each other.")]
    fn complete_activity(
        &self,
        Parameters(req): Parameters<ActivityRequest>,
    ) -> Result<CallToolResult, McpError> {
        let actor = match self.actor(&req.actor) {
            Ok(a) => a,
            Err(err) => return Ok(err),
        };
        Ok(respond(
            self.activities.complete(&actor, &req.activity_id),
            "Marked as completed.",
        ))
    }

    #[tool(description = "Rate another participant of a completed activity you took part in, 1-5 stars. Each person can be rated once per activity by each other participant.")]
    fn rate_user(
        &self,
        Parameters(req): Parameters<RateUserRequest>,
    ) -> Result<CallToolResult, McpError> {
        let actor = match self.actor(&req.actor) {
            Ok(a) => a,
            Err(err) => return Ok(err),
        };
        Ok(respond(
            self.ratings.rate(&actor, &req.activity_id, &req.target, req.stars),
            "Rating submitted.",
        ))
    }

    #[tool(description = "Average stars and number of ratings a user has received. average is null when there are no ratings yet.")]
    fn rating_stats(
        &self,
        Parameters(req): Parameters<RatingStatsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let email = match self.actor(&req.email) {
            Ok(a) => a,
            Err(err) => return Ok(err),
        };
        let stats = self.ratings.stats_for(&email);
        let view = StatsView {
            email,
            average: stats.average,
            display_average: stats.display_average(),
            count: stats.count,
        };
        Ok(CallToolResult::success(vec![Content::text(pretty(&view))]))
    }

    #[tool(description = "Populate an empty install with demo activities. Runs at most once per data directory.")]
    fn seed_demo(
        &self,
        Parameters(req): Parameters<SeedRequest>,
    ) -> Result<CallToolResult, McpError> {
        let actor = match self.actor(&req.actor) {
            Ok(a) => a,
            Err(err) => return Ok(err),
        };
        match seed::seed_if_needed(&self.store, &actor) {
            Ok(true) => Ok(CallToolResult::success(vec![Content::text(
                "Demo activities added.",
            )])),
            Ok(false) => Ok(CallToolResult::success(vec![Content::text(
                "Demo data was already added once; nothing changed.",
            )])),
            Err(e) => Ok(failure(&e)),
        }
    }
}

#[tool_handler]
impl ServerHandler for BuddyServer {
    fn get_info(&self) -> ServerInfo {
        let instructions = format!(
            "{}\n\nAccepted email suffixes: {}",
            INSTRUCTIONS,
            self.gate.accepted_suffixes().join(", ")
        );
        ServerInfo {
            instructions: Some(instructions.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// --- Helpers ---

fn pretty<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("Serialization error: {}", e))
}

/// Tool error text is "<Kind>: <message>" so callers can branch on the kind.
fn failure(err: &BuddyError) -> CallToolResult {
    let outcome = Outcome::failure(err);
    let kind = outcome.kind.map(|k| k.as_str()).unwrap_or("Error");
    CallToolResult::error(vec![Content::text(format!("{}: {}", kind, outcome.message))])
}

fn respond<T: Serialize>(result: buddy_core::Result<T>, success: &str) -> CallToolResult {
    let outcome = Outcome::from_result(&result, success);
    match result {
        Ok(record) => CallToolResult::success(vec![
            Content::text(outcome.message),
            Content::text(pretty(&record)),
        ]),
        Err(e) => failure(&e),
    }
}

const INSTRUCTIONS: &str = r#"Campus Buddy matches members of a closed campus community into small group activities.

## Workflow
1. `sign_in` with the user's institutional email. Pass the returned identity as `actor` to every other tool.
2. `list_activities` to browse (filters: all, active, completed, mine, joined; optional search text).
3. `get_activity` before acting on one activity: it says which actions are allowed for the actor.
4. `create_activity`, `update_activity`, `delete_activity`, `join_activity`, `leave_activity`, `complete_activity` change activities.
5. After an activity is completed, participants use `rate_user` to rate each other once. `rating_stats` shows a user's average.

## Rules
- Only the creator can edit, delete or complete an activity. Completed activities cannot be edited, joined or left.
- Capacity is 2-50 and includes the creator. The creator cannot leave.
- Every refused action returns "<Kind>: <message>"; nothing is changed when an action is refused."#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Handle `buddy-mcp init` subcommand
    if std::env::args().nth(1).as_deref() == Some("init") {
        return init_project();
    }

    let settings = settings::read_settings();
    let store = settings.file_store();
    info!(data_dir = %store.dir().display(), "starting campus-buddy MCP server");

    let service = BuddyServer::new(Arc::new(store), settings.gate())
        .serve(rmcp::transport::io::stdio())
        .await
        .inspect_err(|e| warn!(error = %e, "MCP server error"))?;
    service.waiting().await?;
    Ok(())
}

/// Prepare this machine and project for buddy-mcp: write a default
/// `settings.json` under the Campus Buddy home if there is none, then register
/// the server for Claude Code and/or Codex in the current directory. The
/// registration pins `BUDDY_HOME` so the server reads the same settings and data.
fn init_project() -> Result<(), Box<dyn std::error::Error>> {
    let home = settings::buddy_home();
    let settings_file = settings::settings_path();
    if settings::ensure_settings(&settings_file)? {
        eprintln!("Wrote {}", settings_file.display());
    } else {
        eprintln!("Keeping existing {}", settings_file.display());
    }

    let binary_path = std::env::current_exe()?
        .canonicalize()?
        .to_string_lossy()
        .to_string();
    let cwd = std::env::current_dir()?;

    let has_claude = which("claude");
    let has_codex = which("codex");
    if !has_claude && !has_codex {
        return Err(
            "neither `claude` nor `codex` found in PATH; install one, then re-run `buddy-mcp init`"
                .into(),
        );
    }

    if has_claude {
        let path = cwd.join(".mcp.json");
        let existing = read_if_exists(&path)?;
        let root = merge_mcp_json(existing.as_deref(), &binary_path, &home);
        std::fs::write(&path, serde_json::to_string_pretty(&root)?)?;
        eprintln!("Wrote {}", path.display());
    }
    if has_codex {
        let dir = cwd.join(".codex");
        let path = dir.join("config.toml");
        let existing = read_if_exists(&path)?;
        let doc = merge_codex_toml(existing.as_deref(), &binary_path, &home);
        std::fs::create_dir_all(&dir)?;
        std::fs::write(&path, doc.to_string())?;
        eprintln!("Wrote {}", path.display());
    }
    Ok(())
}

fn which(name: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths).any(|dir| {
                dir.join(name).is_file() || dir.join(format!("{name}.exe")).is_file()
            })
        })
        .unwrap_or(false)
}

fn read_if_exists(path: &Path) -> std::io::Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

const SERVER_NAME: &str = "campus-buddy";

/// `.mcp.json` with the campus-buddy entry replaced; other servers are kept.
/// Unparseable content is replaced.
fn merge_mcp_json(existing: Option<&str>, binary_path: &str, home: &Path) -> serde_json::Value {
    let mut root = existing
        .and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok())
        .filter(|v| v.is_object())
        .unwrap_or_else(|| serde_json::json!({}));

    if !root.get("mcpServers").is_some_and(|v| v.is_object()) {
        root["mcpServers"] = serde_json::json!({});
    }
    let mut env = serde_json::Map::new();
    env.insert(
        settings::HOME_ENV.to_string(),
        serde_json::Value::from(home.to_string_lossy().into_owned()),
    );
    root["mcpServers"][SERVER_NAME] = serde_json::json!({
        "type": "stdio",
        "command": binary_path,
        "args": [],
        "env": env,
    });
    root
}

/// `.codex/config.toml` with the campus-buddy table replaced; formatting and
/// other tables are kept.
fn merge_codex_toml(
    existing: Option<&str>,
    binary_path: &str,
    home: &Path,
) -> toml_edit::DocumentMut {
    let mut doc: toml_edit::DocumentMut = existing
        .and_then(|raw| raw.parse().ok())
        .unwrap_or_default();

    if !doc.contains_table("mcp_servers") {
        doc["mcp_servers"] = toml_edit::Item::Table(toml_edit::Table::new());
    }

    let mut env = toml_edit::Table::new();
    env.insert(
        settings::HOME_ENV,
        toml_edit::value(home.to_string_lossy().into_owned()),
    );
    let mut server = toml_edit::Table::new();
    server.insert("command", toml_edit::value(binary_path));
    server.insert("args", toml_edit::value(toml_edit::Array::new()));
    server.insert("env", toml_edit::Item::Table(env));
    doc["mcp_servers"][SERVER_NAME] = toml_edit::Item::Table(server);
    doc
}
