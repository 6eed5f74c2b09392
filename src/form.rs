//! The BMI form: what is sent to Slack when the form is opened, and how the
//! submitted values are read back. Both directions go through [`BMI_FORM`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::ClientInputError;

/// Interaction type Slack uses for a submitted modal
pub const VIEW_SUBMISSION: &str = "view_submission";

/// Identifies one text input: the block that holds it and the element inside the block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldId {
    pub block_id: &'static str,
    pub action_id: &'static str,
    pub label: &'static str,
}

impl FieldId {
    /// Dotted path of the submitted value inside the interaction payload
    pub fn value_path(&self) -> String {
        format!(
            "view.state.values.{}.{}.value",
            self.block_id, self.action_id
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FormSpec {
    pub callback_id: &'static str,
    pub title: &'static str,
    pub submit: &'static str,
    pub height: FieldId,
    pub weight: FieldId,
}

pub const BMI_FORM: FormSpec = FormSpec {
    callback_id: "bmi_form",
    title: "BMI Calculator",
    submit: "Calculate",
    height: FieldId {
        block_id: "height",
        action_id: "height_input",
        label: "Height (cm)",
    },
    weight: FieldId {
        block_id: "weight",
        action_id: "weight_input",
        label: "Weight (kg)",
    },
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    PlainText { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::PlainText { text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputElement {
    PlainTextInput { action_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Input {
        block_id: String,
        label: TextObject,
        element: InputElement,
    },
}

impl Block {
    fn text_input(field: &FieldId) -> Self {
        Block::Input {
            block_id: field.block_id.to_string(),
            label: TextObject::plain(field.label),
            element: InputElement::PlainTextInput {
                action_id: field.action_id.to_string(),
            },
        }
    }
}

/// Modal view definition passed to `views.open`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModalView {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub callback_id: String,
    pub title: TextObject,
    pub submit: TextObject,
    pub blocks: Vec<Block>,
}

impl FormSpec {
    pub fn modal_view(&self) -> ModalView {
        ModalView {
            kind: "modal",
            callback_id: self.callback_id.to_string(),
            title: TextObject::plain(self.title),
            submit: TextObject::plain(self.submit),
            blocks: vec![
                Block::text_input(&self.height),
                Block::text_input(&self.weight),
            ],
        }
    }
}

/// Interaction payload, decoded from the `payload` form field
#[derive(Debug, Deserialize)]
pub struct InteractionPayload {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub user: Option<InteractionUser>,
    #[serde(default)]
    pub view: Option<SubmittedView>,
}

#[derive(Debug, Deserialize)]
pub struct InteractionUser {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubmittedView {
    #[serde(default)]
    pub callback_id: Option<String>,
    #[serde(default)]
    pub state: Option<ViewState>,
}

#[derive(Debug, Deserialize)]
pub struct ViewState {
    #[serde(default)]
    pub values: HashMap<String, HashMap<String, InputValue>>,
}

#[derive(Debug, Deserialize)]
pub struct InputValue {
    #[serde(default)]
    pub value: Option<String>,
}

impl InteractionPayload {
    pub fn parse(raw: &str) -> Result<Self, ClientInputError> {
        serde_json::from_str(raw).map_err(|e| ClientInputError::MalformedPayload(e.to_string()))
    }

    pub fn is_view_submission(&self) -> bool {
        self.kind == VIEW_SUBMISSION
    }

    /// A submission whose view carries some other callback id belongs to another modal
    pub fn targets(&self, form: &FormSpec) -> bool {
        match self.view.as_ref().and_then(|v| v.callback_id.as_deref()) {
            Some(callback_id) => callback_id == form.callback_id,
            None => true,
        }
    }

    fn submitted_value(&self, field: &FieldId) -> Option<String> {
        self.view
            .as_ref()?
            .state
            .as_ref()?
            .values
            .get(field.block_id)?
            .get(field.action_id)?
            .value
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .map(String::from)
    }
}

/// Values a user entered in the BMI form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSubmission {
    pub height: String,
    pub weight: String,
    pub user_id: String,
}

impl FormSubmission {
    pub fn from_payload(payload: &InteractionPayload, form: &FormSpec) -> Result<Self, ClientInputError> {
        let height = payload
            .submitted_value(&form.height)
            .ok_or_else(|| ClientInputError::MissingField(form.height.value_path()))?;
        let weight = payload
            .submitted_value(&form.weight)
            .ok_or_else(|| ClientInputError::MissingField(form.weight.value_path()))?;
        let user_id = payload
            .user
            .as_ref()
            .and_then(|u| u.id.as_deref())
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ClientInputError::MissingField("user.id".to_string()))?
            .to_string();

        Ok(Self {
            height,
            weight,
            user_id,
        })
    }

    /// Inline errors keyed by block id, for values that do not read as numbers.
    /// Range is left to the CI job.
    pub fn field_errors(&self, form: &FormSpec) -> BTreeMap<String, String> {
        let mut errors = BTreeMap::new();
        for (field, value) in [(&form.height, &self.height), (&form.weight, &self.weight)] {
            if !is_numeric(value) {
                errors.insert(
                    field.block_id.to_string(),
                    format!("{} must be a number", field.label),
                );
            }
        }
        errors
    }
}

fn is_numeric(raw: &str) -> bool {
    raw.trim()
        .parse::<f64>()
        .map(f64::is_finite)
        .unwrap_or(false)
}
