//! Tool registry — static, immutable method table.
//!
//! Built once at startup and consumed by the dispatcher (validation source +
//! mutation gating), by `registry.list` discovery, and by both validation
//! backends. The JSON input schema is projected from the declarative
//! parameter list so the two backends share one source of truth.

use crate::validation::declarative::{ParamDef, ParamType};
use serde_json::Value;
use std::collections::HashMap;

/// Descriptive metadata for one invocable method. Immutable after startup.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// False for methods whose shape may still change between releases.
    pub stable: bool,
    /// True when the method writes to the catalog; gated by the
    /// mutation-enabled flag in the dispatcher.
    pub mutation: bool,
    pub params: Vec<ParamDef>,
    pub output_schema: Value,
}

impl ToolSpec {
    /// A stable read-only method.
    pub fn read(name: &str, description: &str, params: Vec<ParamDef>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            stable: true,
            mutation: false,
            params,
            output_schema: serde_json::json!({"type": "object"}),
        }
    }

    /// A stable mutating method.
    pub fn mutating(name: &str, description: &str, params: Vec<ParamDef>) -> Self {
        Self {
            mutation: true,
            ..Self::read(name, description, params)
        }
    }

    fn unstable(mut self) -> Self {
        self.stable = false;
        self
    }

    /// Project the declarative params into a JSON Schema object.
    ///
    /// Unknown properties are rejected, matching the declarative backend.
    pub fn input_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for def in &self.params {
            let mut schema = def.param_type.json_schema();
            if let Some(obj) = schema.as_object_mut() {
                obj.insert(
                    "description".to_string(),
                    Value::String(def.description.clone()),
                );
            }
            properties.insert(def.name.clone(), schema);
            if def.required {
                required.push(Value::String(def.name.clone()));
            }
        }
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Wire representation for `registry.list`.
    pub fn descriptor(&self) -> Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "stable": self.stable,
            "mutation": self.mutation,
            "inputSchema": self.input_schema(),
            "outputSchema": self.output_schema,
        })
    }
}

/// Immutable, name-sorted table of every invocable method.
#[derive(Debug)]
pub struct ToolRegistry {
    tools: Vec<ToolSpec>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Build the standard method table.
    pub fn standard() -> Self {
        use ParamType as T;

        let mut tools = vec![
            ToolSpec::read(
                "initialize",
                "Handshake: returns server info and capabilities",
                vec![
                    ParamDef::optional("clientName", T::String, "Client display name"),
                    ParamDef::optional("clientVersion", T::String, "Client version"),
                ],
            ),
            ToolSpec::read("registry.list", "Enumerate the tool registry", vec![]),
            ToolSpec::read(
                "catalog.list",
                "List catalog entries",
                vec![
                    ParamDef::optional("offset", T::Int, "Pagination offset"),
                    ParamDef::optional("limit", T::Int, "Page size"),
                ],
            ),
            ToolSpec::read(
                "catalog.get",
                "Fetch one entry by id",
                vec![ParamDef::required("id", T::String, "Entry id")],
            ),
            ToolSpec::read(
                "catalog.search",
                "Free-text substring search over title and body",
                vec![
                    ParamDef::required("text", T::String, "Search text"),
                    ParamDef::optional("limit", T::Int, "Maximum results"),
                ],
            ),
            ToolSpec::read(
                "catalog.query",
                "Filtered query with category, requirement, priority and text filters",
                vec![
                    ParamDef::optional("categoriesAll", T::StringList, "Must carry every category"),
                    ParamDef::optional("categoriesAny", T::StringList, "Must carry one category"),
                    ParamDef::optional("requirements", T::StringList, "Requirement filter set"),
                    ParamDef::optional("priorityMin", T::Int, "Inclusive lower priority bound"),
                    ParamDef::optional("priorityMax", T::Int, "Inclusive upper priority bound"),
                    ParamDef::optional(
                        "priorityTier",
                        T::Enum(vec!["P0".into(), "P1".into(), "P2".into(), "P3".into()]),
                        "Governance tier filter",
                    ),
                    ParamDef::optional("text", T::String, "Substring over title and body"),
                    ParamDef::optional("offset", T::Int, "Pagination offset"),
                    ParamDef::optional("limit", T::Int, "Page size"),
                ],
            ),
            ToolSpec::read("catalog.categories", "Distinct categories with counts", vec![]),
            ToolSpec::read(
                "catalog.diff",
                "Three-way diff against a client inventory",
                vec![
                    ParamDef::optional("known", T::ObjectList, "Known {id, sourceHash} pairs"),
                    ParamDef::optional("aggregateHash", T::String, "Client aggregate hash"),
                ],
            ),
            ToolSpec::read("catalog.export", "Full catalog dump with aggregate hash", vec![]),
            ToolSpec::read(
                "catalog.governanceHash",
                "Digest over governance fields, independent of body edits",
                vec![],
            ),
            ToolSpec::read("catalog.health", "Catalog health summary", vec![]),
            ToolSpec::mutating(
                "catalog.add",
                "Add or overwrite one entry",
                vec![
                    ParamDef::required("id", T::String, "Entry id (filename-safe)"),
                    ParamDef::required("title", T::String, "Entry title"),
                    ParamDef::required("body", T::String, "Entry body text"),
                    ParamDef::optional("priority", T::Int, "Lower = more important"),
                    ParamDef::optional(
                        "audience",
                        T::Enum(vec![
                            "all".into(),
                            "operators".into(),
                            "developers".into(),
                            "compliance".into(),
                        ]),
                        "Target audience",
                    ),
                    ParamDef::optional(
                        "requirement",
                        T::Enum(vec![
                            "mandatory".into(),
                            "critical".into(),
                            "recommended".into(),
                            "optional".into(),
                            "deprecated".into(),
                        ]),
                        "Requirement level",
                    ),
                    ParamDef::optional("categories", T::StringList, "Category tags"),
                    ParamDef::optional("riskScore", T::Float, "Risk score"),
                    ParamDef::optional("owner", T::String, "Governance owner"),
                    ParamDef::optional("overwrite", T::Bool, "Replace an existing id"),
                ],
            ),
            ToolSpec::mutating(
                "catalog.import",
                "Bulk add with per-item outcomes",
                vec![ParamDef::required("items", T::ObjectList, "Entries to import")],
            ),
            ToolSpec::mutating(
                "catalog.remove",
                "Remove entries by id with per-id outcomes",
                vec![ParamDef::required("ids", T::StringList, "Entry ids")],
            ),
            // Not flagged `mutation`: a zero-drift repair must stay legal with
            // mutation disabled. The engine refuses the first actual rewrite.
            ToolSpec::read(
                "catalog.repair",
                "Recompute hashes and rewrite drifted entries",
                vec![],
            ),
            ToolSpec::mutating("catalog.reload", "Invalidate and reload the catalog", vec![]),
            ToolSpec::mutating(
                "catalog.groom",
                "Normalize, dedupe, purge and hash-repair the catalog",
                vec![
                    ParamDef::optional("dryRun", T::Bool, "Predict counts, write nothing"),
                    ParamDef::optional("removeDeprecated", T::Bool, "Delete deprecated entries"),
                    ParamDef::optional("mergeDuplicates", T::Bool, "Merge same-body entries"),
                    ParamDef::optional("purgeLegacyScopes", T::Bool, "Strip legacy scope tokens"),
                ],
            )
            .unstable(),
            ToolSpec::mutating(
                "catalog.governanceUpdate",
                "Patch governance fields on one entry",
                vec![
                    ParamDef::required("id", T::String, "Entry id"),
                    ParamDef::required("set", T::Object, "Governance fields to set"),
                    ParamDef::optional("note", T::String, "Change-log note"),
                ],
            )
            .unstable(),
            ToolSpec::read(
                "usage.track",
                "Rate-limited usage increment",
                vec![ParamDef::required("id", T::String, "Entry id")],
            ),
            ToolSpec::read(
                "usage.hotset",
                "Top entries by usage count",
                vec![ParamDef::optional("limit", T::Int, "How many to return")],
            ),
            ToolSpec::read("usage.flush", "Force the usage snapshot to disk", vec![]),
            ToolSpec::read(
                "integrity.verify",
                "Recompute on-disk hashes and report drift",
                vec![],
            ),
            ToolSpec::read("metrics.snapshot", "Server metrics counters", vec![]),
            ToolSpec::read(
                "batch",
                "Run sub-operations in order with per-item isolation",
                vec![ParamDef::required("ops", T::ObjectList, "{method, params} items")],
            ),
        ];

        tools.sort_by(|a, b| a.name.cmp(&b.name));
        let by_name = tools
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i))
            .collect();
        Self { tools, by_name }
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.by_name.get(name).map(|&i| &self.tools[i])
    }

    pub fn has(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// All tools, name-sorted.
    pub fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
