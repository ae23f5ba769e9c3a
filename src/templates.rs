use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Name of a response card template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateName {
    Dashboard,
    Chart,
    Action,
}

impl TemplateName {
    pub const ALL: [TemplateName; 3] = [Self::Dashboard, Self::Chart, Self::Action];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Chart => "chart",
            Self::Action => "action",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.as_str() == s)
    }
}

impl fmt::Display for TemplateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Optional fields may be absent but not null. Unknown fields are ignored,
// so re-serializing a payload drops them.
fn non_null<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(de).map(Some)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub label: String,
    pub value: String,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub trend: Option<Trend>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub change: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardProps {
    pub title: String,
    pub metrics: Vec<Metric>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
    Pie,
    Area,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub label: String,
    /// Kept as a JSON number so `10` is re-emitted as `10`, not `10.0`.
    pub value: serde_json::Number,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartProps {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: ChartKind,
    pub data: Vec<ChartPoint>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Primary,
    Secondary,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionButton {
    pub label: String,
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionProps {
    pub title: String,
    pub description: String,
    pub actions: Vec<ActionButton>,
}

/// Template data validated against the shape its name declares.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePayload {
    Dashboard(DashboardProps),
    Chart(ChartProps),
    Action(ActionProps),
}

impl TemplatePayload {
    pub fn from_value(name: TemplateName, data: Value) -> Result<Self, serde_json::Error> {
        Ok(match name {
            TemplateName::Dashboard => Self::Dashboard(serde_json::from_value(data)?),
            TemplateName::Chart => Self::Chart(serde_json::from_value(data)?),
            TemplateName::Action => Self::Action(serde_json::from_value(data)?),
        })
    }

    pub fn name(&self) -> TemplateName {
        match self {
            Self::Dashboard(_) => TemplateName::Dashboard,
            Self::Chart(_) => TemplateName::Chart,
            Self::Action(_) => TemplateName::Action,
        }
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::Dashboard(p) => serde_json::to_value(p),
            Self::Chart(p) => serde_json::to_value(p),
            Self::Action(p) => serde_json::to_value(p),
        }
    }
}

/// Registry entry describing one template to the model.
#[derive(Debug, Clone, Copy)]
pub struct TemplateSpec {
    pub name: TemplateName,
    pub purpose: &'static str,
    /// Field shape as shown to the model.
    pub shape: &'static str,
}

/// One entry per `TemplateName`, in `TemplateName::ALL` order.
pub static REGISTRY: [TemplateSpec; 3] = [
    TemplateSpec {
        name: TemplateName::Dashboard,
        purpose: "For displaying metrics and KPIs.",
        shape: r#"{ "title": "string", "metrics": [{ "label": "string", "value": "string", "trend": "up" | "down" | "neutral", "change": "string" }], "lastUpdated": "string" }"#,
    },
    TemplateSpec {
        name: TemplateName::Chart,
        purpose: "For data visualizations.",
        shape: r#"{ "title": "string", "type": "line" | "bar" | "pie" | "area", "data": [{ "label": "string", "value": number }], "unit": "string" }"#,
    },
    TemplateSpec {
        name: TemplateName::Action,
        purpose: "For interactive cards.",
        shape: r#"{ "title": "string", "description": "string", "actions": [{ "label": "string", "type": "primary" | "secondary" | "danger", "action": "string" }] }"#,
    },
];

pub fn spec_for(name: TemplateName) -> &'static TemplateSpec {
    match name {
        TemplateName::Dashboard => &REGISTRY[0],
        TemplateName::Chart => &REGISTRY[1],
        TemplateName::Action => &REGISTRY[2],
    }
}

/// Build the fixed instruction prepended to every conversation.
pub fn system_instruction() -> String {
    let mut out = String::from(
        "You are a helpful assistant that creates structured responses using specific templates.\n\nAvailable templates:\n",
    );
    for (i, name) in TemplateName::ALL.into_iter().enumerate() {
        let spec = spec_for(name);
        out.push_str(&format!(
            "{}. {} - {} Response format: {}\n",
            i + 1,
            spec.name,
            spec.purpose,
            spec.shape
        ));
    }

    let names = TemplateName::ALL
        .iter()
        .map(|n| format!("\"{n}\""))
        .collect::<Vec<_>>()
        .join(" | ");
    out.push_str(&format!(
        "\nIMPORTANT: You must respond with a JSON object in this exact format:\n{{\n  \"template\": {names},\n  \"data\": {{ /* template-specific data as shown above */ }}\n}}\n\nAlways use realistic, contextual data based on the user's request."
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registry_matches_enum_order() {
        for (spec, name) in REGISTRY.iter().zip(TemplateName::ALL) {
            assert_eq!(spec.name, name);
            assert_eq!(spec_for(name).name, name);
        }
    }

    #[test]
    fn instruction_names_every_template() {
        let text = system_instruction();
        for name in TemplateName::ALL {
            assert!(text.contains(&format!("{name} - ")), "missing {name}");
        }
        assert!(text.contains(r#""template": "dashboard" | "chart" | "action""#));
        assert!(text.contains("\"lastUpdated\""));
    }

    #[test]
    fn parse_template_name() {
        assert_eq!(TemplateName::parse("chart"), Some(TemplateName::Chart));
        assert_eq!(TemplateName::parse("Chart"), None);
        assert_eq!(TemplateName::parse("table"), None);
    }

    #[test]
    fn chart_keeps_integer_values() {
        let data = json!({
            "title": "Sales",
            "type": "bar",
            "data": [{"label": "Q1", "value": 10}, {"label": "Q2", "value": 20.5}]
        });
        let payload = TemplatePayload::from_value(TemplateName::Chart, data.clone()).unwrap();
        assert_eq!(payload.name(), TemplateName::Chart);
        assert_eq!(payload.to_value().unwrap(), data);
        assert_eq!(
            serde_json::to_string(&payload.to_value().unwrap()["data"][0]).unwrap(),
            r#"{"label":"Q1","value":10}"#
        );
    }

    #[test]
    fn dashboard_optional_fields() {
        let data = json!({
            "title": "KPIs",
            "metrics": [
                {"label": "Revenue", "value": "$1M", "trend": "up", "change": "+5%"},
                {"label": "Churn", "value": "2%"}
            ],
            "lastUpdated": "today"
        });
        let payload = TemplatePayload::from_value(TemplateName::Dashboard, data.clone()).unwrap();
        let TemplatePayload::Dashboard(props) = &payload else {
            panic!("expected dashboard");
        };
        assert_eq!(props.metrics[0].trend, Some(Trend::Up));
        assert_eq!(props.metrics[1].trend, None);
        assert_eq!(props.last_updated.as_deref(), Some("today"));
        assert_eq!(payload.to_value().unwrap(), data);
    }

    #[test]
    fn empty_sequences_are_valid() {
        let cases = [
            (TemplateName::Dashboard, json!({"title": "t", "metrics": []})),
            (TemplateName::Chart, json!({"title": "t", "type": "pie", "data": []})),
            (
                TemplateName::Action,
                json!({"title": "t", "description": "d", "actions": []}),
            ),
        ];
        for (name, data) in cases {
            assert!(TemplatePayload::from_value(name, data).is_ok(), "{name}");
        }
    }

    #[test]
    fn unknown_fields_are_dropped() {
        let data = json!({
            "title": "Sales",
            "type": "bar",
            "color": "red",
            "data": [{"label": "Q1", "value": 10, "note": "best"}]
        });
        let payload = TemplatePayload::from_value(TemplateName::Chart, data).unwrap();
        assert_eq!(
            payload.to_value().unwrap(),
            json!({"title": "Sales", "type": "bar", "data": [{"label": "Q1", "value": 10}]})
        );
    }

    #[test]
    fn null_optionals_are_rejected() {
        let cases = [
            (TemplateName::Chart, json!({"title": "t", "type": "bar", "data": [], "unit": null})),
            (TemplateName::Dashboard, json!({"title": "t", "metrics": [], "lastUpdated": null})),
            (
                TemplateName::Dashboard,
                json!({"title": "t", "metrics": [{"label": "a", "value": "1", "trend": null}]}),
            ),
        ];
        for (name, data) in cases {
            assert!(TemplatePayload::from_value(name, data.clone()).is_err(), "{data}");
        }
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        // chart data under the dashboard name
        let chart = json!({"title": "Sales", "type": "bar", "data": []});
        assert!(TemplatePayload::from_value(TemplateName::Dashboard, chart).is_err());

        let bad_enum = json!({
            "title": "t",
            "description": "d",
            "actions": [{"label": "Go", "type": "urgent", "action": "go"}]
        });
        assert!(TemplatePayload::from_value(TemplateName::Action, bad_enum).is_err());

        let string_value = json!({
            "title": "t",
            "type": "line",
            "data": [{"label": "a", "value": "10"}]
        });
        assert!(TemplatePayload::from_value(TemplateName::Chart, string_value).is_err());
    }
}
