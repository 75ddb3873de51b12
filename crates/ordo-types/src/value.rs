use std::collections::HashMap;

pub use serde_json::Value;

/// Parameters handed to every rule of a pass.
pub type Params = HashMap<String, Value>;

/// Variables written by rule actions during a pass.
pub type Variables = HashMap<String, Value>;
