use std::time::Duration;

use async_trait::async_trait;
use configs::OneBotConfig;
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::directory::{GroupDirectory, GroupMember};
use crate::errors::ServiceError;

/// Response envelope shared by every OneBot action.
#[derive(Debug, Deserialize)]
struct ActionResponse {
    status: String,
    #[serde(default)]
    retcode: i64,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    wording: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginInfo {
    user_id: i64,
}

#[derive(Debug, Deserialize)]
struct GroupInfo {
    #[serde(default, deserialize_with = "lenient_id")]
    group_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct MemberInfo {
    #[serde(default, deserialize_with = "lenient_id")]
    user_id: Option<i64>,
    #[serde(default)]
    card: Option<String>,
    #[serde(default)]
    nickname: Option<String>,
}

// 部分实现把 id 编码成字符串；缺失或无法解析的条目丢弃，不拖累整个列表
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Calls OneBot actions as `POST {base_url}/{action}` with a JSON body.
#[derive(Clone)]
pub struct OneBotClient {
    http: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl OneBotClient {
    pub fn new(cfg: &OneBotConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| ServiceError::Validation(format!("cannot build http client: {e}")))?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            access_token: cfg.access_token.clone(),
        })
    }

    #[instrument(skip(self, params), level = "debug")]
    async fn call<T: DeserializeOwned>(&self, action: &str, params: Value) -> Result<T, ServiceError> {
        let url = format!("{}/{}", self.base_url, action);
        let mut req = self.http.post(&url).json(&params);
        if let Some(token) = &self.access_token {
            req = req.bearer_auth(token);
        }
        let resp = req
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ServiceError::remote(action, e))?;
        let body = resp
            .json::<ActionResponse>()
            .await
            .map_err(|e| ServiceError::remote(action, e))?;

        if body.status != "ok" && body.status != "async" {
            let detail = body.wording.or(body.message).unwrap_or_default();
            return Err(ServiceError::Remote(format!(
                "{action}: status={} retcode={} {detail}",
                body.status, body.retcode
            )));
        }
        debug!(action, retcode = body.retcode, "onebot action ok");
        serde_json::from_value(body.data).map_err(|e| ServiceError::remote(action, e))
    }
}

#[async_trait]
impl GroupDirectory for OneBotClient {
    async fn get_identity(&self) -> Result<i64, ServiceError> {
        let info: LoginInfo = self.call("get_login_info", json!({})).await?;
        Ok(info.user_id)
    }

    async fn list_groups(&self) -> Result<Vec<i64>, ServiceError> {
        let groups: Option<Vec<GroupInfo>> = self.call("get_group_list", json!({})).await?;
        Ok(groups.unwrap_or_default().into_iter().filter_map(|g| g.group_id).collect())
    }

    async fn list_members(&self, group_id: i64) -> Result<Vec<GroupMember>, ServiceError> {
        let members: Option<Vec<MemberInfo>> = self
            .call("get_group_member_list", json!({ "group_id": group_id, "no_cache": true }))
            .await?;
        Ok(members
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| {
                let user_id = m.user_id?;
                Some(GroupMember { user_id, card: m.card, nickname: m.nickname })
            })
            .collect())
    }

    async fn set_own_display_name(&self, group_id: i64, self_id: i64, name: &str) -> Result<(), ServiceError> {
        let _: Value = self
            .call("set_group_card", json!({ "group_id": group_id, "user_id": self_id, "card": name }))
            .await?;
        Ok(())
    }

    async fn notify_member(&self, group_id: i64, member_id: i64) -> Result<(), ServiceError> {
        let _: Value = self
            .call("group_poke", json!({ "group_id": group_id, "user_id": member_id }))
            .await?;
        Ok(())
    }
}
