//! Column layout of the MRP records and the two classifier feature groups

/// Source row id, kept as the row identity of every derived table
pub const RECORD_ID: &str = "record_id";
/// Material number (carried through, never a feature)
pub const MATERIAL: &str = "material";
/// Ground-truth / predicted label column
pub const LABEL: &str = "sourcer_code";

/// Component-type columns deciding which classifier a row goes to
pub const COMPONENT_COLUMNS: [&str; 2] = ["colA", "colB"];

/// Categorical columns that are frequency encoded (features and label)
pub const ENCODED_COLUMNS: [&str; 8] = [
    "colA", "colB", "colC", "colD", "colE", "colF", "colG", LABEL,
];

/// Columns of the preprocessed, training and inference tables
pub const RECORD_COLUMNS: [&str; 10] = [
    RECORD_ID, MATERIAL, "colA", "colB", "colC", "colD", "colE", "colF", "colG", LABEL,
];

/// Ranked prediction columns appended to the result table
pub const PREDICTION_COLUMNS: [&str; 3] = ["prediction1", "prediction2", "prediction3"];

/// The two feature sets a plant trains a classifier for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureGroup {
    /// Full feature set including the component types
    WithComponents,
    /// Reduced feature set for rows lacking component types
    WithoutComponents,
}

impl FeatureGroup {
    pub const ALL: [FeatureGroup; 2] = [FeatureGroup::WithComponents, FeatureGroup::WithoutComponents];

    /// Feature columns, in the order the classifier sees them
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            FeatureGroup::WithComponents => &["colA", "colB", "colC", "colD", "colE"],
            FeatureGroup::WithoutComponents => &["colC", "colD", "colE", "colF", "colG"],
        }
    }

    /// Registered model name for a plant
    pub fn model_name(self, plant: &str) -> String {
        match self {
            FeatureGroup::WithComponents => format!("{}_model.json", plant),
            FeatureGroup::WithoutComponents => format!("{}_model_no_comp.json", plant),
        }
    }

    /// Human-readable name used in logs and registry descriptions
    pub fn describe(self) -> &'static str {
        match self {
            FeatureGroup::WithComponents => "with component types",
            FeatureGroup::WithoutComponents => "without component types",
        }
    }
}
