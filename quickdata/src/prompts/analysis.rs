use std::fmt::Write as _;

use tracing::instrument;

use super::{format_thousands, missing_dataset, title_case, COLUMN_PLACEHOLDER};
use crate::registry::DatasetRegistry;
use crate::schema::DatasetSchema;
use crate::stats::round_to;

fn first_or_placeholder(columns: &[String]) -> &str {
    columns.first().map_or(COLUMN_PLACEHOLDER, String::as_str)
}

fn backticked(columns: &[String]) -> String {
    if columns.is_empty() {
        "none".to_string()
    } else {
        format!("`{}`", columns.join(", "))
    }
}

async fn schema_or_error(registry: &DatasetRegistry, dataset_name: &str) -> Result<DatasetSchema, String> {
    registry
        .schema(dataset_name)
        .await
        .map_err(|_| missing_dataset(dataset_name))
}

/// Overview of a freshly loaded dataset with suggested first steps.
#[instrument(skip(registry))]
pub async fn dataset_first_look(registry: &DatasetRegistry, dataset_name: &str) -> String {
    let schema = match schema_or_error(registry, dataset_name).await {
        Ok(schema) => schema,
        Err(message) => return message,
    };
    let numerical = schema.numerical_columns();
    let categorical = schema.categorical_columns();
    let temporal = schema.temporal_columns();

    let mut prompt = format!("### First Look at '{dataset_name}'\n\n");
    writeln!(
        prompt,
        "I've loaded your dataset! It has **{} rows** and **{} columns**.\n",
        format_thousands(schema.row_count),
        schema.column_count()
    )
    .unwrap();
    prompt.push_str("**Column Types:**\n");
    writeln!(prompt, "- **Numerical ({}):** {}", numerical.len(), backticked(&numerical)).unwrap();
    writeln!(prompt, "- **Categorical ({}):** {}", categorical.len(), backticked(&categorical)).unwrap();
    if !temporal.is_empty() {
        writeln!(prompt, "- **Temporal ({}):** {}", temporal.len(), backticked(&temporal)).unwrap();
    }
    prompt.push_str("\n**Recommended Starting Points:**\n");
    if numerical.len() >= 2 {
        prompt.push_str("- **Explore Relationships**: See how numerical columns relate.\n");
        writeln!(prompt, "  - `/find_correlations dataset_name:'{dataset_name}'`").unwrap();
    }
    if let (Some(num), Some(cat)) = (numerical.first(), categorical.first()) {
        writeln!(
            prompt,
            "- **Segment Your Data**: Analyze `{num}` across different categories of `{cat}`."
        )
        .unwrap();
        writeln!(
            prompt,
            "  - `/segment_by_column dataset_name:'{dataset_name}' column_name:'{cat}'`"
        )
        .unwrap();
    }
    if let (Some(date), Some(num)) = (temporal.first(), numerical.first()) {
        writeln!(prompt, "- **Spot Trends**: Follow `{num}` over `{date}`.").unwrap();
        writeln!(
            prompt,
            "  - `/time_series_analysis dataset_name:'{dataset_name}' date_column:'{date}' value_column:'{num}'`"
        )
        .unwrap();
    }
    prompt.push_str("- **Check Data Quality**: Get a report on missing data and other issues.\n");
    writeln!(prompt, "  - `/validate_data_quality dataset_name:'{dataset_name}'`\n").unwrap();
    prompt.push_str("**What would you like to investigate first?**");
    prompt
}

/// Segmentation plan; withheld when there is nothing categorical to group by.
#[instrument(skip(registry))]
pub async fn segmentation_workshop(registry: &DatasetRegistry, dataset_name: &str) -> String {
    let schema = match schema_or_error(registry, dataset_name).await {
        Ok(schema) => schema,
        Err(message) => return message,
    };
    let categorical = schema.categorical_columns();
    let Some(first) = categorical.first() else {
        return format!(
            "### Segmentation Not Possible\n\nThe **{dataset_name}** dataset has no categorical \
             columns, which are needed to create segments. Consider creating categorical features \
             from numerical data."
        );
    };

    let mut prompt = format!("### Segmentation Workshop for '{dataset_name}'\n\n");
    prompt.push_str("Let's break down your data into meaningful groups (segments) to find insights.\n\n");
    prompt.push_str("**Available Columns for Segmentation:**\n");
    for column in &categorical {
        let unique = schema.column(column).map_or(0, |c| c.unique_values);
        writeln!(prompt, "- `{column}` ({unique} unique values)").unwrap();
    }
    prompt.push_str("\n**Suggested Workflow:**\n");
    prompt.push_str(
        "1. **Choose a Segment**: Pick a column from the list above that represents a meaningful \
         grouping (e.g., region, product category).\n",
    );
    prompt.push_str(
        "2. **Run Segmentation**: Use the `/segment_by_column` tool to see how numerical data \
         differs across these groups.\n",
    );
    writeln!(
        prompt,
        "   - `/segment_by_column dataset_name:'{dataset_name}' column_name:'{first}'`"
    )
    .unwrap();
    prompt.push_str("3. **Visualize the Segments**: Create a bar chart to easily compare the segments.\n");
    writeln!(
        prompt,
        "   - `/create_chart dataset_name:'{dataset_name}' chart_type:'bar' x_column:'{first}'`\n"
    )
    .unwrap();
    prompt.push_str("**Which column would you like to use to segment your data?**");
    prompt
}

/// Completeness and uniqueness snapshot with a review workflow.
#[instrument(skip(registry))]
pub async fn data_quality_assessment(registry: &DatasetRegistry, dataset_name: &str) -> String {
    let (table, schema) = match registry.entry(dataset_name).await {
        Ok(entry) => entry,
        Err(_) => return missing_dataset(dataset_name),
    };

    let cells = table.num_rows() * table.num_columns();
    let missing_pct = if cells == 0 {
        0.0
    } else {
        table.total_null_count() as f64 / cells as f64 * 100.0
    };

    let mut prompt = format!("### Data Quality Assessment for '{dataset_name}'\n\n");
    writeln!(
        prompt,
        "Let's review the quality of your dataset ({} rows).\n",
        format_thousands(schema.row_count)
    )
    .unwrap();
    prompt.push_str("**1. Completeness:**\n");
    writeln!(
        prompt,
        "- Overall, your dataset is **{:.1}%** complete.",
        100.0 - missing_pct
    )
    .unwrap();
    let worst = schema
        .columns
        .iter()
        .filter(|c| c.null_percentage > 0.0)
        .max_by(|a, b| a.null_percentage.total_cmp(&b.null_percentage));
    match worst {
        Some(column) => {
            writeln!(prompt, "- Top column with missing data: `{}`.\n", column.name).unwrap();
        }
        None => prompt.push_str("- No missing values found. Excellent!\n\n"),
    }

    prompt.push_str("**2. Uniqueness:**\n");
    match table.duplicate_row_count() {
        Ok(0) => prompt.push_str("- No duplicate rows found. Great!\n\n"),
        Ok(duplicates) => {
            let share = round_to(duplicates as f64 / table.num_rows() as f64 * 100.0, 1);
            writeln!(prompt, "- Found **{duplicates} duplicate rows** ({share}%).\n").unwrap();
        }
        Err(err) => {
            return format!("**Error**: An unexpected error occurred while generating the prompt: {err}")
        }
    }

    prompt.push_str("**Suggested Workflow:**\n");
    prompt.push_str("1. **Run Full Report**: Get a detailed quality score and breakdown.\n");
    writeln!(prompt, "   - `/validate_data_quality dataset_name:'{dataset_name}'`").unwrap();
    prompt.push_str("2. **Check for Outliers**: Identify unusual data points in numerical columns.\n");
    writeln!(prompt, "   - `/detect_outliers dataset_name:'{dataset_name}'`").unwrap();
    prompt.push_str("3. **Investigate Distributions**: Understand the shape of your data.\n");
    writeln!(
        prompt,
        "   - `/analyze_distributions dataset_name:'{dataset_name}' column_name:'{COLUMN_PLACEHOLDER}'`\n"
    )
    .unwrap();
    prompt.push_str("**Next Step:**\n");
    prompt.push_str("Start with the full report to get a comprehensive list of issues and recommendations.");
    prompt
}

/// Correlation workflow; withheld below two numerical columns.
#[instrument(skip(registry))]
pub async fn correlation_investigation(registry: &DatasetRegistry, dataset_name: &str) -> String {
    let schema = match schema_or_error(registry, dataset_name).await {
        Ok(schema) => schema,
        Err(message) => return message,
    };
    let numerical = schema.numerical_columns();
    if numerical.len() < 2 {
        return format!(
            "### Correlation Analysis Not Possible\n\nThe **{dataset_name}** dataset has fewer than \
             two numerical columns, which are required for correlation analysis."
        );
    }

    let mut prompt = format!("### Correlation Investigation for '{dataset_name}'\n\n");
    prompt.push_str("Let's explore the relationships between numerical variables in your dataset.\n\n");
    prompt.push_str("**Available Numerical Columns:**\n");
    for column in &numerical {
        writeln!(prompt, "- `{column}`").unwrap();
    }
    prompt.push_str("\n**Suggested Workflow:**\n");
    prompt.push_str("1. **Overall Correlation Matrix**: Get a complete overview of all correlations.\n");
    writeln!(prompt, "   - `/find_correlations dataset_name:'{dataset_name}'`").unwrap();
    prompt.push_str("2. **Visualize Strongest Pairs**: Create scatter plots for interesting pairs.\n");
    writeln!(
        prompt,
        "   - `/create_chart dataset_name:'{dataset_name}' chart_type:'scatter' x_column:'{}' y_column:'{}'`",
        numerical[0], numerical[1]
    )
    .unwrap();
    prompt.push_str("3. **Deeper Dive**: Analyze distributions of highly correlated variables.\n");
    writeln!(
        prompt,
        "   - `/analyze_distributions dataset_name:'{dataset_name}' column_name:'{}'`\n",
        numerical[0]
    )
    .unwrap();
    prompt.push_str("**Key Concepts:**\n");
    prompt.push_str(
        "- **Correlation Coefficient**: A value between -1 and 1. `1` is total positive \
         correlation, `-1` is total negative, and `0` is no correlation.\n",
    );
    prompt.push_str(
        "- **Correlation vs. Causation**: A strong correlation does not imply one variable causes \
         the other.\n",
    );
    prompt
}

/// Distribution, relationship and segment patterns worth exploring.
#[instrument(skip(registry))]
pub async fn pattern_discovery_session(registry: &DatasetRegistry, dataset_name: &str) -> String {
    let schema = match schema_or_error(registry, dataset_name).await {
        Ok(schema) => schema,
        Err(message) => return message,
    };
    let numerical = schema.numerical_columns();
    let categorical = schema.categorical_columns();
    let temporal = schema.temporal_columns();

    let mut prompt = format!("### Pattern Discovery Session for '{dataset_name}'\n\n");
    prompt.push_str("Let's uncover hidden patterns in your data. Here are some avenues for exploration:\n\n");

    prompt.push_str("**1. Distribution Patterns (Shape of your data):**\n");
    prompt.push_str("- Look for skewed distributions, multiple peaks, or gaps.\n");
    writeln!(
        prompt,
        "- **Tool**: `/analyze_distributions dataset_name:'{dataset_name}' column_name:'{}'`\n",
        first_or_placeholder(&numerical)
    )
    .unwrap();

    let mut section = 2;
    if numerical.len() >= 2 {
        writeln!(prompt, "**{section}. Relationship Patterns (How variables interact):**").unwrap();
        prompt.push_str("- Find strong correlations between numerical variables.\n");
        writeln!(prompt, "- **Tool**: `/find_correlations dataset_name:'{dataset_name}'`\n").unwrap();
        section += 1;
    }
    if let Some(cat) = categorical.first() {
        writeln!(prompt, "**{section}. Segmentation Patterns (Hidden groups):**").unwrap();
        writeln!(
            prompt,
            "- Discover how numerical data behaves across different categories of `{cat}`."
        )
        .unwrap();
        writeln!(
            prompt,
            "- **Tool**: `/segment_by_column dataset_name:'{dataset_name}' column_name:'{cat}'`\n"
        )
        .unwrap();
        section += 1;
    }
    if let (Some(date), Some(num)) = (temporal.first(), numerical.first()) {
        writeln!(prompt, "**{section}. Temporal Patterns (Change over time):**").unwrap();
        writeln!(prompt, "- Check whether `{num}` trends up or down over `{date}`.").unwrap();
        writeln!(
            prompt,
            "- **Tool**: `/time_series_analysis dataset_name:'{dataset_name}' date_column:'{date}' value_column:'{num}'`\n"
        )
        .unwrap();
    }
    prompt.push_str("**Where would you like to start your search for patterns?**");
    prompt
}

/// Framework for turning findings into recommendations for a business context.
#[instrument(skip(registry))]
pub async fn insight_generation_workshop(
    registry: &DatasetRegistry,
    dataset_name: &str,
    business_context: Option<&str>,
) -> String {
    if let Err(message) = schema_or_error(registry, dataset_name).await {
        return message;
    }
    let context = business_context.unwrap_or("general");

    let mut prompt = format!("### Insight Generation Workshop for '{dataset_name}'\n\n");
    writeln!(prompt, "**Business Context:** {}\n", title_case(context)).unwrap();
    prompt.push_str("Let's turn data into actionable insights! Here is a framework to guide our workshop.\n\n");
    prompt.push_str("**1. Define Key Business Questions:**\n");
    writeln!(prompt, "- Based on a '{context}' context, what are we trying to achieve?").unwrap();
    prompt.push_str("- Which columns in your dataset are the most important Key Performance Indicators (KPIs)?\n\n");
    prompt.push_str("**2. Analysis & Pattern Discovery:**\n");
    prompt.push_str("Let's find meaningful patterns. Here are some ideas:\n");
    writeln!(
        prompt,
        "- `/suggest_analysis dataset_name:'{dataset_name}'` - Get analysis suggestions."
    )
    .unwrap();
    prompt.push_str("- `/segment_by_column ...` - Compare performance across different segments.\n");
    prompt.push_str("- `/find_correlations ...` - Discover unexpected relationships.\n\n");
    prompt.push_str("**3. Synthesize & Recommend:**\n");
    prompt.push_str("Once we find a pattern, we need to ask:\n");
    prompt.push_str("- **So what?** Why does this pattern matter to the business?\n");
    prompt.push_str("- **Now what?** What specific action can we take based on this insight?\n\n");
    prompt.push_str("**Example for a 'Sales' context:**\n");
    prompt.push_str("- **Finding:** `Sales in Region 'A' are 50% lower than in 'B'.`\n");
    prompt.push_str("- **Insight (So what?):** `We are missing a major market opportunity in Region 'A'.`\n");
    prompt.push_str("- **Recommendation (Now what?):** `Launch a targeted marketing campaign in Region 'A'.`\n\n");
    prompt.push_str("**Let's begin! What is the primary goal of your analysis today?**");
    prompt
}

/// Dashboard plan tailored to an audience (`executive` gets KPI questions).
#[instrument(skip(registry))]
pub async fn dashboard_design_consultation(
    registry: &DatasetRegistry,
    dataset_name: &str,
    audience: Option<&str>,
) -> String {
    let schema = match schema_or_error(registry, dataset_name).await {
        Ok(schema) => schema,
        Err(message) => return message,
    };
    let audience = audience.unwrap_or("general");
    let numerical = schema.numerical_columns();
    let categorical = schema.categorical_columns();
    let measure = first_or_placeholder(&numerical);
    let dimension = first_or_placeholder(&categorical);
    let second_measure = numerical.get(1).map_or(measure, String::as_str);

    let mut prompt = format!("### Dashboard Design Consultation for '{dataset_name}'\n\n");
    writeln!(prompt, "**Audience:** {}\n", title_case(audience)).unwrap();
    prompt.push_str("Let's design an effective dashboard. Here's a plan based on your data and target audience.\n\n");
    prompt.push_str("**1. Available Data:**\n");
    writeln!(
        prompt,
        "- **Measures (Numerical):** {} columns like `{measure}`.",
        numerical.len()
    )
    .unwrap();
    writeln!(
        prompt,
        "- **Dimensions (Categorical):** {} columns like `{dimension}`.\n",
        categorical.len()
    )
    .unwrap();
    prompt.push_str("**2. Key Questions to Answer:**\n");
    if audience.eq_ignore_ascii_case("executive") {
        prompt.push_str("- What are the top-level KPIs? How are they trending?\n");
        prompt.push_str("- Are we meeting our goals?\n");
        prompt.push_str("- Where are the biggest risks or opportunities?\n\n");
    } else {
        writeln!(prompt, "- How does `{measure}` vary across `{dimension}`?").unwrap();
        prompt.push_str("- What are the top segments? What are the outliers?\n");
        prompt.push_str("- Is there a relationship between different measures?\n\n");
    }
    prompt.push_str("**3. Suggested Charts & Workflow:**\n");
    prompt.push_str("A good dashboard tells a story. Here's a suggested flow:\n");
    prompt.push_str("1. **High-Level KPIs**: Start with the most important numbers.\n");
    prompt.push_str("2. **Trend Analysis**: Show performance over time.\n");
    prompt.push_str("3. **Segmentation**: Break down the data by key categories.\n\n");
    prompt.push_str("**Example Commands to Build Charts:**\n");
    writeln!(
        prompt,
        "- **KPI Bar Chart**: `/create_chart dataset_name:'{dataset_name}' chart_type:'bar' x_column:'{dimension}' y_column:'{measure}'`"
    )
    .unwrap();
    writeln!(
        prompt,
        "- **Relationship Scatter Plot**: `/create_chart dataset_name:'{dataset_name}' chart_type:'scatter' x_column:'{measure}' y_column:'{second_measure}'`\n"
    )
    .unwrap();
    prompt.push_str("**Next Step:**\n");
    prompt.push_str("Use the `/generate_dashboard` tool with a list of the chart configurations you design.\n");
    prompt
}
