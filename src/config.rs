//! Column mapping and cleaning knobs shared by the pipeline and binaries.

use clap::Args;

/// Header names the pipeline reads from an uploaded sheet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnMap {
    /// Test case identifier (required).
    pub id: String,
    /// Feature or module under test.
    pub feature: String,
    /// Free-text test case description.
    pub description: String,
    /// Setup that must hold before the steps run.
    pub prerequisites: String,
    /// Comma-separated tag list.
    pub tags: String,
    /// Priority label.
    pub priority: String,
    /// Target platform label.
    pub platform: String,
    /// Step ordinal.
    pub step_number: String,
    /// Step instruction text.
    pub step_text: String,
    /// Expected outcome of the step.
    pub expected_result: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            id: "Test Case ID".to_string(),
            feature: "Feature".to_string(),
            description: "Test Case Description".to_string(),
            prerequisites: "Pre-requisites".to_string(),
            tags: "Tags".to_string(),
            priority: "Priority".to_string(),
            platform: "Platform".to_string(),
            step_number: "Step No.".to_string(),
            step_text: "Test Step".to_string(),
            expected_result: "Expected Result".to_string(),
        }
    }
}

/// Cell values treated as missing by default: the usual spreadsheet and dataframe
/// fillers. `NA` is left out so identifiers spelled "NA" still reach the row filter.
pub const DEFAULT_NULL_MARKERS: &[&str] = &[
    "nan", "NaN", "-nan", "-NaN", "<NA>", "N/A", "n/a", "#N/A", "#N/A N/A", "#NA", "NULL",
    "null", "None", "1.#IND", "1.#QNAN", "-1.#IND", "-1.#QNAN",
];

const DEFAULT_NULL_MARKERS_ARG: &str =
    "nan,NaN,-nan,-NaN,<NA>,N/A,n/a,#N/A,#N/A N/A,#NA,NULL,null,None,1.#IND,1.#QNAN,-1.#IND,-1.#QNAN";

/// Tunable knobs for one ingestion run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestConfig {
    columns: ColumnMap,
    null_markers: Vec<String>,
}

impl IngestConfig {
    /// Constructs a config from explicit parts.
    pub fn new(columns: ColumnMap, null_markers: Vec<String>) -> Self {
        Self {
            columns,
            null_markers,
        }
    }

    /// Column names used to read the sheet.
    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    /// Exact cell values blanked out by the row normalizer.
    pub fn null_markers(&self) -> &[String] {
        &self.null_markers
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            columns: ColumnMap::default(),
            null_markers: DEFAULT_NULL_MARKERS
                .iter()
                .map(|marker| marker.to_string())
                .collect(),
        }
    }
}

/// Command-line overrides for header names and null markers.
#[derive(Args, Debug, Clone)]
pub struct ColumnArgs {
    /// Header of the test case identifier column
    #[arg(long, env = "FASTCASE_COL_ID", default_value = "Test Case ID")]
    pub id_column: String,

    /// Header of the feature column
    #[arg(long, env = "FASTCASE_COL_FEATURE", default_value = "Feature")]
    pub feature_column: String,

    /// Header of the description column
    #[arg(
        long,
        env = "FASTCASE_COL_DESCRIPTION",
        default_value = "Test Case Description"
    )]
    pub description_column: String,

    /// Header of the prerequisites column
    #[arg(
        long,
        env = "FASTCASE_COL_PREREQUISITES",
        default_value = "Pre-requisites"
    )]
    pub prerequisites_column: String,

    /// Header of the comma-separated tags column
    #[arg(long, env = "FASTCASE_COL_TAGS", default_value = "Tags")]
    pub tags_column: String,

    /// Header of the priority column
    #[arg(long, env = "FASTCASE_COL_PRIORITY", default_value = "Priority")]
    pub priority_column: String,

    /// Header of the platform column
    #[arg(long, env = "FASTCASE_COL_PLATFORM", default_value = "Platform")]
    pub platform_column: String,

    /// Header of the step number column
    #[arg(long, env = "FASTCASE_COL_STEP_NO", default_value = "Step No.")]
    pub step_number_column: String,

    /// Header of the step text column
    #[arg(long, env = "FASTCASE_COL_STEP", default_value = "Test Step")]
    pub step_text_column: String,

    /// Header of the expected result column
    #[arg(
        long,
        env = "FASTCASE_COL_EXPECTED",
        default_value = "Expected Result"
    )]
    pub expected_result_column: String,

    /// Cell values treated as empty, comma separated
    #[arg(long, env = "FASTCASE_NULL_MARKERS", default_value = DEFAULT_NULL_MARKERS_ARG)]
    pub null_markers: String,
}

impl ColumnArgs {
    /// Converts the parsed arguments into an `IngestConfig`.
    pub fn build_config(&self) -> IngestConfig {
        let columns = ColumnMap {
            id: self.id_column.clone(),
            feature: self.feature_column.clone(),
            description: self.description_column.clone(),
            prerequisites: self.prerequisites_column.clone(),
            tags: self.tags_column.clone(),
            priority: self.priority_column.clone(),
            platform: self.platform_column.clone(),
            step_number: self.step_number_column.clone(),
            step_text: self.step_text_column.clone(),
            expected_result: self.expected_result_column.clone(),
        };
        IngestConfig::new(columns, self.markers_vec())
    }

    fn markers_vec(&self) -> Vec<String> {
        self.null_markers
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}
