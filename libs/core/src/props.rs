//! Structured user and messenger properties, and their mapping onto the flat
//! snake_case settings object the vendor API reads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Flat key/value settings as handed to the vendor entry point.
pub type RawSettings = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetProps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_request_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsubscribed_from_emails: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_override: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_campaign: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_medium: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<Avatar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<Company>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub companies: Option<Vec<Company>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_launcher_selector: Option<String>,
    /// `left` or `right`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical_padding: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizontal_padding: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide_default_launcher: Option<bool>,
    /// Milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_attributes: Option<Map<String, Value>>,
}

impl WidgetProps {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_custom_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom_attributes
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Avatar {
    #[serde(rename = "type", default = "default_avatar_type")]
    pub kind: String,
    pub image_url: String,
}

fn default_avatar_type() -> String {
    "avatar".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub company_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_spend: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_attributes: Option<Map<String, Value>>,
}

/// Translates structured props into the vendor's flat settings shape.
///
/// Absent fields are omitted. Custom attributes are flattened into the top level
/// and win over same-named standard keys.
pub fn map_to_raw_settings(props: &WidgetProps) -> RawSettings {
    let mut raw = RawSettings::new();
    put(&mut raw, "email", props.email.clone());
    put(&mut raw, "user_id", props.user_id.clone());
    put(&mut raw, "created_at", props.created_at);
    put(&mut raw, "name", props.name.clone());
    put(&mut raw, "phone", props.phone.clone());
    put(&mut raw, "last_request_at", props.last_request_at);
    put(
        &mut raw,
        "unsubscribed_from_emails",
        props.unsubscribed_from_emails,
    );
    put(&mut raw, "language_override", props.language_override.clone());
    put(&mut raw, "utm_campaign", props.utm_campaign.clone());
    put(&mut raw, "utm_content", props.utm_content.clone());
    put(&mut raw, "utm_medium", props.utm_medium.clone());
    put(&mut raw, "utm_source", props.utm_source.clone());
    put(&mut raw, "utm_term", props.utm_term.clone());
    if let Some(avatar) = &props.avatar {
        let mut obj = Map::new();
        obj.insert("type".into(), Value::from(avatar.kind.clone()));
        obj.insert("image_url".into(), Value::from(avatar.image_url.clone()));
        raw.insert("avatar".into(), Value::Object(obj));
    }
    put(&mut raw, "user_hash", props.user_hash.clone());
    if let Some(company) = &props.company {
        raw.insert("company".into(), Value::Object(map_company(company)));
    }
    if let Some(companies) = &props.companies {
        let list = companies
            .iter()
            .map(|company| Value::Object(map_company(company)))
            .collect();
        raw.insert("companies".into(), Value::Array(list));
    }
    put(&mut raw, "page_title", props.page_title.clone());
    put(
        &mut raw,
        "custom_launcher_selector",
        props.custom_launcher_selector.clone(),
    );
    put(&mut raw, "alignment", props.alignment.clone());
    put(&mut raw, "vertical_padding", props.vertical_padding);
    put(&mut raw, "horizontal_padding", props.horizontal_padding);
    put(&mut raw, "hide_default_launcher", props.hide_default_launcher);
    put(&mut raw, "session_duration", props.session_duration);
    put(&mut raw, "action_color", props.action_color.clone());
    put(&mut raw, "background_color", props.background_color.clone());
    if let Some(custom) = &props.custom_attributes {
        raw.extend(custom.clone());
    }
    raw
}

fn map_company(company: &Company) -> Map<String, Value> {
    let mut raw = Map::new();
    raw.insert("company_id".into(), Value::from(company.company_id.clone()));
    put(&mut raw, "name", company.name.clone());
    put(&mut raw, "created_at", company.created_at);
    put(&mut raw, "plan", company.plan.clone());
    put(&mut raw, "monthly_spend", company.monthly_spend);
    put(&mut raw, "user_count", company.user_count);
    put(&mut raw, "size", company.size);
    put(&mut raw, "website", company.website.clone());
    put(&mut raw, "industry", company.industry.clone());
    if let Some(custom) = &company.custom_attributes {
        raw.extend(custom.clone());
    }
    raw
}

fn put<T: Into<Value>>(raw: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(value) = value {
        raw.insert(key.to_string(), value.into());
    }
}
