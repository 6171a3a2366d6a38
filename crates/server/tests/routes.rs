use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode as HttpStatusCode;
use serde_json::Value;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use configs::GroupMode;
use server::routes::{self, AppState};
use service::directory::{GroupDirectory, GroupMember};
use service::errors::ServiceError;
use service::file::state_store::StateStore;
use service::possession::{GroupFilter, PossessionService};

const SELF_ID: i64 = 10001;

/// Group 100 has the bot and one member, group 200 only the bot,
/// group 300 exists but the remote refuses every call about it.
struct StaticDirectory;

#[async_trait]
impl GroupDirectory for StaticDirectory {
    async fn get_identity(&self) -> Result<i64, ServiceError> {
        Ok(SELF_ID)
    }

    async fn list_groups(&self) -> Result<Vec<i64>, ServiceError> {
        Ok(vec![100, 200, 300])
    }

    async fn list_members(&self, group_id: i64) -> Result<Vec<GroupMember>, ServiceError> {
        match group_id {
            100 => Ok(vec![
                GroupMember::new(SELF_ID, Some("bot"), None),
                GroupMember::new(20002, Some(" Dave "), Some("dave")),
            ]),
            200 => Ok(vec![GroupMember::new(SELF_ID, None, Some("bot"))]),
            _ => Err(ServiceError::Remote("get_group_member_list: timeout".into())),
        }
    }

    async fn set_own_display_name(&self, _group_id: i64, _self_id: i64, _name: &str) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn notify_member(&self, _group_id: i64, _member_id: i64) -> Result<(), ServiceError> {
        Ok(())
    }
}

struct TestApp {
    base_url: String,
    store: Arc<StateStore>,
    _dir: tempfile::TempDir,
}

async fn start_server(filter: GroupFilter) -> anyhow::Result<TestApp> {
    let dir = tempfile::tempdir()?;
    let store = StateStore::open(dir.path().join("state.json")).await?;
    let service = Arc::new(PossessionService::new(Arc::new(StaticDirectory), store.clone(), filter));

    let app = routes::build_router(AppState { service }, CorsLayer::very_permissive());
    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let addr: SocketAddr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await { eprintln!("server error: {}", e); }
    });

    Ok(TestApp { base_url: format!("http://{}:{}", addr.ip(), addr.port()), store, _dir: dir })
}

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

#[tokio::test]
async fn health_and_metrics() -> anyhow::Result<()> {
    let app = start_server(GroupFilter::default()).await?;

    let res = client().get(format!("{}/health", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    assert_eq!(res.json::<Value>().await?["status"], "ok");

    let res = client().get(format!("{}/metrics", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn possess_then_status_then_clear() -> anyhow::Result<()> {
    use service::store::PossessionStore;

    let app = start_server(GroupFilter::default()).await?;

    let res = client().post(format!("{}/groups/100/possess", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["group_id"], 100);
    assert_eq!(body["target_user_id"], 20002);
    assert_eq!(body["target_name"], "Dave");
    assert_eq!(
        app.store.get(&SELF_ID.to_string(), "100").await.map(|r| r.target_name),
        Some("Dave".to_string())
    );

    let res = client().get(format!("{}/groups/100/possession", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    assert_eq!(res.json::<Value>().await?["target_name"], "Dave");

    let res = client().delete(format!("{}/groups/100/possession", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::NO_CONTENT);
    let res = client().delete(format!("{}/groups/100/possession", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::NOT_FOUND);
    assert!(res.json::<Value>().await?["error"].as_str().is_some());
    let res = client().get(format!("{}/groups/100/possession", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn no_target_and_filtered_groups() -> anyhow::Result<()> {
    let app = start_server(GroupFilter::new(GroupMode::Blacklist, [100])).await?;

    let res = client().post(format!("{}/groups/200/possess", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::NOT_FOUND);
    assert!(res.json::<Value>().await?["error"].as_str().is_some());

    let res = client().post(format!("{}/groups/100/possess", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn bad_ids_and_remote_failures() -> anyhow::Result<()> {
    let app = start_server(GroupFilter::default()).await?;

    let res = client().post(format!("{}/groups/0/possess", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::BAD_REQUEST);

    let res = client().post(format!("{}/groups/abc/possess", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::BAD_REQUEST);

    let res = client().post(format!("{}/groups/300/possess", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::BAD_GATEWAY);
    Ok(())
}
