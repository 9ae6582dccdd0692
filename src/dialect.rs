//! Per-database fragment generators and the column type classifier.
//!
//! Column types are free-form strings taken straight from the schema
//! catalog (`VARCHAR(255)`, `timestamp with time zone`, `USER-DEFINED`...).
//! They are normalised and matched case-insensitively against a fixed
//! vocabulary per dialect. Anything unrecognised classifies as
//! [`TypeClass::Opaque`] and is treated like a number: never quoted.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    #[serde(rename = "MySQL")]
    MySql,
    #[serde(rename = "PostgreSQL")]
    PostgreSql,
    #[serde(rename = "SQLServer")]
    SqlServer,
}

/// How a statement references upstream nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Every input is nested as `(SELECT ...) AS alias`.
    Inline,
    /// Every input is named once in a leading `WITH` clause.
    CommonTableExpressions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    Numeric,
    Text,
    Boolean,
    Date,
    Opaque,
}

struct Vocabulary {
    numeric: &'static [&'static str],
    text: &'static [&'static str],
    boolean: &'static [&'static str],
    date: &'static [&'static str],
    /// Text-like types that must be cast before they can be compared or sliced.
    cast_to_text: &'static [&'static str],
}

const MYSQL: Vocabulary = Vocabulary {
    numeric: &[
        "tinyint", "smallint", "mediumint", "int", "integer", "bigint", "decimal", "dec",
        "numeric", "fixed", "float", "double", "double precision", "real", "bit", "serial",
    ],
    text: &[
        "char", "varchar", "tinytext", "text", "mediumtext", "longtext", "enum", "set", "json",
    ],
    boolean: &["bool", "boolean"],
    date: &["date", "datetime", "timestamp", "time", "year"],
    cast_to_text: &["enum", "set", "json"],
};

const POSTGRES: Vocabulary = Vocabulary {
    numeric: &[
        "smallint", "integer", "int", "int2", "int4", "int8", "bigint", "decimal", "numeric",
        "real", "double precision", "float4", "float8", "smallserial", "serial", "bigserial",
        "money",
    ],
    text: &[
        "character varying", "varchar", "character", "char", "bpchar", "text", "name", "citext",
        "uuid", "xml", "json", "jsonb", "user-defined",
    ],
    boolean: &["boolean", "bool"],
    date: &[
        "date", "timestamp", "timestamp without time zone", "timestamp with time zone",
        "timestamptz", "time", "time without time zone", "time with time zone", "timetz",
    ],
    cast_to_text: &["uuid", "xml", "json", "jsonb", "user-defined", "citext", "name"],
};

const SQLSERVER: Vocabulary = Vocabulary {
    numeric: &[
        "tinyint", "smallint", "int", "bigint", "decimal", "numeric", "float", "real", "money",
        "smallmoney",
    ],
    text: &[
        "char", "varchar", "nchar", "nvarchar", "text", "ntext", "xml", "uniqueidentifier",
        "sysname",
    ],
    boolean: &["bit"],
    date: &[
        "date", "datetime", "datetime2", "smalldatetime", "datetimeoffset", "time",
    ],
    cast_to_text: &["text", "ntext", "xml", "uniqueidentifier"],
};

const SQLSERVER_CASE_INSENSITIVE: &str = "Latin1_General_CI_AS";
const SQLSERVER_CASE_SENSITIVE: &str = "Latin1_General_CS_AS";

const LIKE_ESCAPE: char = '!';

// Length/precision parameters: `varchar(255)`, `numeric(10, 2)`, `timestamp(6)`.
static TYPE_PARAMS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^)]*\)").expect("type parameter pattern"));

/// Lower-case a catalog type name and strip parameters and sign modifiers.
pub fn normalize_type(type_name: &str) -> String {
    let lowered = type_name.to_lowercase();
    let stripped = TYPE_PARAMS.replace_all(&lowered, " ");
    stripped
        .split_whitespace()
        .filter(|w| !matches!(*w, "unsigned" | "signed" | "zerofill"))
        .collect::<Vec<_>>()
        .join(" ")
}

impl Dialect {
    pub fn default_strategy(self) -> Strategy {
        match self {
            Dialect::MySql => Strategy::Inline,
            Dialect::PostgreSql | Dialect::SqlServer => Strategy::CommonTableExpressions,
        }
    }

    fn vocabulary(self) -> &'static Vocabulary {
        match self {
            Dialect::MySql => &MYSQL,
            Dialect::PostgreSql => &POSTGRES,
            Dialect::SqlServer => &SQLSERVER,
        }
    }

    pub fn classify(self, type_name: &str) -> TypeClass {
        let normalized = normalize_type(type_name);
        let vocab = self.vocabulary();
        let known = |list: &[&str]| list.contains(&normalized.as_str());

        // Boolean first: SQL Server's BIT is a boolean, MySQL's is a number.
        if known(vocab.boolean) {
            TypeClass::Boolean
        } else if known(vocab.date) {
            TypeClass::Date
        } else if known(vocab.text) {
            TypeClass::Text
        } else if known(vocab.numeric) {
            TypeClass::Numeric
        } else {
            TypeClass::Opaque
        }
    }

    pub fn is_numeric(self, type_name: &str) -> bool {
        self.classify(type_name) == TypeClass::Numeric
    }

    pub fn is_text(self, type_name: &str) -> bool {
        self.classify(type_name) == TypeClass::Text
    }

    pub fn is_boolean(self, type_name: &str) -> bool {
        self.classify(type_name) == TypeClass::Boolean
    }

    pub fn is_date(self, type_name: &str) -> bool {
        self.classify(type_name) == TypeClass::Date
    }

    /// Literals compared against this type must be written as quoted strings.
    pub fn needs_quoting(self, type_name: &str) -> bool {
        matches!(self.classify(type_name), TypeClass::Text | TypeClass::Date)
    }

    /// Table sources expose these types through a cast to plain text.
    pub fn needs_text_exposure(self, type_name: &str) -> bool {
        let normalized = normalize_type(type_name);
        self.vocabulary()
            .cast_to_text
            .contains(&normalized.as_str())
    }

    /// The argument of a substring operation must be cast to text first.
    pub fn needs_cast_before_substring(self, type_name: &str) -> bool {
        match self {
            Dialect::MySql => false,
            Dialect::PostgreSql => !self.is_text(type_name),
            Dialect::SqlServer => self.is_date(type_name) || !self.needs_quoting(type_name),
        }
    }

    pub fn text_type_name(self) -> &'static str {
        match self {
            Dialect::MySql => "varchar",
            Dialect::PostgreSql => "text",
            Dialect::SqlServer => "nvarchar",
        }
    }

    pub fn integer_type_name(self) -> &'static str {
        match self {
            Dialect::MySql => "bigint",
            Dialect::PostgreSql => "bigint",
            Dialect::SqlServer => "int",
        }
    }

    pub fn float_type_name(self) -> &'static str {
        match self {
            Dialect::MySql => "double",
            Dialect::PostgreSql => "double precision",
            Dialect::SqlServer => "float",
        }
    }

    pub fn quote_ident(self, name: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", name.replace('`', "``")),
            Dialect::PostgreSql => format!("\"{}\"", name.replace('"', "\"\"")),
            Dialect::SqlServer => format!("[{}]", name.replace(']', "]]")),
        }
    }

    /// Quote a table reference given as identifier parts (`["dbo", "Orders"]`).
    /// Parts are quoted whole, so a dot inside one stays part of the name.
    pub fn quote_path<S: AsRef<str>>(self, parts: &[S]) -> String {
        parts
            .iter()
            .map(|part| self.quote_ident(part.as_ref()))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Single-quoted string literal with embedded quotes doubled.
    pub fn quote_string(self, value: &str) -> String {
        let escaped = value.replace('\'', "''");
        match self {
            Dialect::SqlServer => format!("N'{}'", escaped),
            Dialect::MySql | Dialect::PostgreSql => format!("'{}'", escaped),
        }
    }

    pub fn bool_literal(self, value: bool) -> &'static str {
        match (self, value) {
            (Dialect::SqlServer, true) => "1",
            (Dialect::SqlServer, false) => "0",
            (_, true) => "TRUE",
            (_, false) => "FALSE",
        }
    }

    pub fn cast_to_text(self, expr: &str, type_name: &str) -> String {
        match self {
            Dialect::MySql => format!("CAST({} AS CHAR)", expr),
            Dialect::PostgreSql => format!("CAST({} AS TEXT)", expr),
            // Style 120 keeps dates in ODBC canonical form instead of "Jan  1 2020".
            Dialect::SqlServer if self.is_date(type_name) => {
                format!("CONVERT(NVARCHAR(MAX), {}, 120)", expr)
            }
            Dialect::SqlServer => format!("CAST({} AS NVARCHAR(MAX))", expr),
        }
    }

    pub fn length_function(self) -> &'static str {
        match self {
            Dialect::MySql | Dialect::PostgreSql => "LENGTH",
            Dialect::SqlServer => "LEN",
        }
    }

    /// 1-based position of `needle` in `haystack`, optionally searching from `from`.
    pub fn locate(self, needle: &str, haystack: &str, from: Option<&str>) -> String {
        match (self, from) {
            (Dialect::MySql, None) => format!("LOCATE({}, {})", needle, haystack),
            (Dialect::MySql, Some(from)) => format!("LOCATE({}, {}, {})", needle, haystack, from),
            (Dialect::SqlServer, None) => format!("CHARINDEX({}, {})", needle, haystack),
            (Dialect::SqlServer, Some(from)) => {
                format!("CHARINDEX({}, {}, {})", needle, haystack, from)
            }
            (Dialect::PostgreSql, None) => format!("POSITION({} IN {})", needle, haystack),
            (Dialect::PostgreSql, Some(from)) => format!(
                "(POSITION({} IN SUBSTRING({} FROM {})) + {} - 1)",
                needle, haystack, from, from
            ),
        }
    }

    pub fn substring(self, expr: &str, start: &str, length: &str) -> String {
        match self {
            Dialect::PostgreSql => format!("SUBSTRING({} FROM {} FOR {})", expr, start, length),
            Dialect::MySql | Dialect::SqlServer => {
                format!("SUBSTRING({}, {}, {})", expr, start, length)
            }
        }
    }

    pub fn now(self) -> &'static str {
        match self {
            Dialect::MySql | Dialect::PostgreSql => "NOW()",
            Dialect::SqlServer => "GETDATE()",
        }
    }

    /// The moment `hours` hours after (or, when negative, before) now.
    pub fn hours_from_now(self, hours: i64) -> String {
        match self {
            Dialect::MySql => format!("DATE_ADD(NOW(), INTERVAL {} HOUR)", hours),
            Dialect::PostgreSql => format!("NOW() + INTERVAL '{} hours'", hours),
            Dialect::SqlServer => format!("DATEADD(hour, {}, GETDATE())", hours),
        }
    }

    /// Whole days from today to `expr`: negative in the past, positive in the future.
    pub fn day_offset(self, expr: &str) -> String {
        match self {
            Dialect::MySql => format!("DATEDIFF({}, NOW())", expr),
            Dialect::PostgreSql => format!("(CAST({} AS DATE) - CURRENT_DATE)", expr),
            Dialect::SqlServer => format!("DATEDIFF(day, GETDATE(), {})", expr),
        }
    }

    /// Whole calendar months from the current month to the month of `expr`.
    pub fn month_offset(self, expr: &str) -> String {
        match self {
            Dialect::MySql => format!(
                "PERIOD_DIFF(DATE_FORMAT({}, '%Y%m'), DATE_FORMAT(NOW(), '%Y%m'))",
                expr
            ),
            Dialect::PostgreSql => format!(
                "((EXTRACT(YEAR FROM {e}) - EXTRACT(YEAR FROM NOW())) * 12 + EXTRACT(MONTH FROM {e}) - EXTRACT(MONTH FROM NOW()))",
                e = expr
            ),
            Dialect::SqlServer => format!("DATEDIFF(month, GETDATE(), {})", expr),
        }
    }

    /// `YYYY-MM` text of a date expression.
    pub fn month_of(self, expr: &str) -> String {
        match self {
            Dialect::MySql => format!("DATE_FORMAT({}, '%Y-%m')", expr),
            Dialect::PostgreSql => format!("TO_CHAR({}, 'YYYY-MM')", expr),
            Dialect::SqlServer => format!("CONVERT(VARCHAR(7), {}, 120)", expr),
        }
    }

    pub fn year_of(self, expr: &str) -> String {
        match self {
            Dialect::MySql | Dialect::SqlServer => format!("YEAR({})", expr),
            Dialect::PostgreSql => format!("EXTRACT(YEAR FROM {})", expr),
        }
    }

    pub fn average(self, expr: &str) -> String {
        match self {
            // AVG over an INT column truncates on SQL Server.
            Dialect::SqlServer => format!("AVG(CAST({} AS FLOAT))", expr),
            Dialect::MySql | Dialect::PostgreSql => format!("AVG({})", expr),
        }
    }

    /// Compare two text expressions honouring the requested case sensitivity.
    pub fn compare_text(self, lhs: &str, op: &str, rhs: &str, case_sensitive: bool) -> String {
        match (self, case_sensitive) {
            (Dialect::PostgreSql, false) => format!("LOWER({}) {} LOWER({})", lhs, op, rhs),
            (Dialect::SqlServer, false) => format!(
                "{} COLLATE {} {} {}",
                lhs, SQLSERVER_CASE_INSENSITIVE, op, rhs
            ),
            (Dialect::SqlServer, true) => {
                format!("{} COLLATE {} {} {}", lhs, SQLSERVER_CASE_SENSITIVE, op, rhs)
            }
            (Dialect::MySql, true) => format!("BINARY {} {} {}", lhs, op, rhs),
            (Dialect::PostgreSql, true) | (Dialect::MySql, false) => {
                format!("{} {} {}", lhs, op, rhs)
            }
        }
    }

    /// Escape `LIKE` wildcards in `value` so it matches literally. Pair the
    /// pattern with [`Dialect::like_escape`].
    pub fn escape_like(self, value: &str) -> String {
        let mut out = String::with_capacity(value.len());
        for ch in value.chars() {
            let special = match ch {
                LIKE_ESCAPE | '%' | '_' => true,
                '[' => self == Dialect::SqlServer,
                _ => false,
            };
            if special {
                out.push(LIKE_ESCAPE);
            }
            out.push(ch);
        }
        out
    }

    pub fn like_escape(self) -> &'static str {
        "ESCAPE '!'"
    }

    /// Pagination clause appended after `ORDER BY` under the inline strategy.
    pub fn limit_clause(self, offset: u64, limit: u64) -> String {
        match self {
            Dialect::MySql => format!("LIMIT {},{}", offset, limit),
            Dialect::PostgreSql => format!("LIMIT {} OFFSET {}", limit, offset),
            Dialect::SqlServer => format!("OFFSET {} ROWS FETCH NEXT {} ROWS ONLY", offset, limit),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dialect::MySql => "MySQL",
            Dialect::PostgreSql => "PostgreSQL",
            Dialect::SqlServer => "SQL Server",
        };
        f.write_str(name)
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '_', '-'], "").as_str() {
            "mysql" => Ok(Dialect::MySql),
            "postgresql" | "postgres" | "pg" => Ok(Dialect::PostgreSql),
            "sqlserver" | "mssql" => Ok(Dialect::SqlServer),
            other => Err(format!(
                "unknown dialect '{}' (expected mysql, postgresql or sqlserver)",
                other
            )),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inline" => Ok(Strategy::Inline),
            "cte" | "with" => Ok(Strategy::CommonTableExpressions),
            other => Err(format!("unknown strategy '{}' (expected inline or cte)", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalizes_parameters_and_modifiers() {
        assert_eq!(normalize_type("VARCHAR(255)"), "varchar");
        assert_eq!(normalize_type("int(11) unsigned"), "int");
        assert_eq!(
            normalize_type("TIMESTAMP(6) WITH TIME ZONE"),
            "timestamp with time zone"
        );
        assert_eq!(normalize_type("numeric(10, 2)"), "numeric");
    }

    #[test]
    fn classifies_per_dialect() {
        assert_eq!(Dialect::SqlServer.classify("BIT"), TypeClass::Boolean);
        assert_eq!(Dialect::MySql.classify("bit"), TypeClass::Numeric);
        assert_eq!(Dialect::PostgreSql.classify("character varying(40)"), TypeClass::Text);
        assert_eq!(Dialect::PostgreSql.classify("timestamptz"), TypeClass::Date);
        assert_eq!(Dialect::MySql.classify("DATETIME"), TypeClass::Date);
        assert_eq!(Dialect::SqlServer.classify("geography"), TypeClass::Opaque);
        assert!(!Dialect::SqlServer.needs_quoting("geography"));
        assert!(Dialect::MySql.needs_quoting("date"));
    }

    #[test]
    fn quoting_doubles_embedded_quote_characters() {
        assert_eq!(Dialect::MySql.quote_ident("we`ird"), "`we``ird`");
        assert_eq!(Dialect::PostgreSql.quote_ident("a\"b"), "\"a\"\"b\"");
        assert_eq!(Dialect::SqlServer.quote_ident("x]y"), "[x]]y]");
        assert_eq!(Dialect::SqlServer.quote_path(&["dbo", "Orders"]), "[dbo].[Orders]");
        assert_eq!(Dialect::PostgreSql.quote_path(&["v1.2 rates"]), "\"v1.2 rates\"");
        assert_eq!(Dialect::MySql.quote_string("O'Brien"), "'O''Brien'");
        assert_eq!(Dialect::SqlServer.quote_string("O'Brien"), "N'O''Brien'");
    }

    #[test]
    fn boolean_spelling() {
        assert_eq!(Dialect::PostgreSql.bool_literal(true), "TRUE");
        assert_eq!(Dialect::PostgreSql.bool_literal(false), "FALSE");
        assert_eq!(Dialect::SqlServer.bool_literal(true), "1");
    }

    #[test]
    fn parses_dialect_names() {
        assert_eq!("MySQL".parse::<Dialect>(), Ok(Dialect::MySql));
        assert_eq!("postgres".parse::<Dialect>(), Ok(Dialect::PostgreSql));
        assert_eq!("SQL Server".parse::<Dialect>(), Ok(Dialect::SqlServer));
        assert!("oracle".parse::<Dialect>().is_err());
    }
}
