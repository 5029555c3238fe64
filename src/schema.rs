use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Float,
    String,
    Date,
}

impl ColumnType {
    /// Warehouse type name.
    pub fn sql_name(&self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Float => "FLOAT",
            Self::String => "STRING",
            Self::Date => "DATE",
        }
    }
}

/// Declared contract for one column of a transaction file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub unique: bool,
    pub non_negative: bool,
}

const fn col(name: &'static str, column_type: ColumnType, nullable: bool) -> ColumnSpec {
    ColumnSpec {
        name,
        column_type,
        nullable,
        unique: false,
        non_negative: false,
    }
}

pub const TRANSACTION_SCHEMA: &[ColumnSpec] = &[
    ColumnSpec {
        name: "transaction_id",
        column_type: ColumnType::Integer,
        nullable: false,
        unique: true,
        non_negative: true,
    },
    col("product_name", ColumnType::String, false),
    col("category", ColumnType::String, false),
    ColumnSpec {
        non_negative: true,
        ..col("price", ColumnType::Float, false)
    },
    ColumnSpec {
        non_negative: true,
        ..col("quantity", ColumnType::Integer, false)
    },
    col("date", ColumnType::Date, false),
    col("customer_name", ColumnType::String, true),
    col("customer_email", ColumnType::String, true),
];

/// How much of the declared schema a validation run enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Sign and numeric checks on `non_negative` columns only.
    #[default]
    Observed,
    /// Every declared constraint.
    Strict,
}

impl std::str::FromStr for ValidationMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "observed" => Ok(Self::Observed),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unknown validation mode: {other} (expected observed or strict)")),
        }
    }
}

/// A single check on a column, evaluated per cell in the listed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Column must appear in the header.
    Present,
    NotNull,
    Numeric,
    Integer,
    NonNegative,
    ValidDate,
    Unique,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledColumn {
    pub spec: ColumnSpec,
    pub rules: Vec<Rule>,
}

pub fn compile(schema: &[ColumnSpec], mode: ValidationMode) -> Vec<CompiledColumn> {
    schema
        .iter()
        .map(|spec| {
            let mut rules = Vec::new();
            match mode {
                ValidationMode::Observed => {
                    if spec.non_negative {
                        rules.push(Rule::NonNegative);
                    }
                }
                ValidationMode::Strict => {
                    rules.push(Rule::Present);
                    if !spec.nullable {
                        rules.push(Rule::NotNull);
                    }
                    match spec.column_type {
                        ColumnType::Integer => rules.push(Rule::Integer),
                        ColumnType::Float => rules.push(Rule::Numeric),
                        ColumnType::Date => rules.push(Rule::ValidDate),
                        ColumnType::String => {}
                    }
                    if spec.non_negative {
                        rules.push(Rule::NonNegative);
                    }
                    if spec.unique {
                        rules.push(Rule::Unique);
                    }
                }
            }
            CompiledColumn { spec: *spec, rules }
        })
        .filter(|c| !c.rules.is_empty())
        .collect()
}
