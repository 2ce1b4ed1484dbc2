//! Typed import rows for each category, decoded from loosely-typed JSON objects.
//!
//! Payloads come from spreadsheets as often as from code, so numbers may arrive
//! as strings, flags as "sim"/"nao", and blank cells as empty strings.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::validate;
use super::Category;

pub trait ImportRow: DeserializeOwned {
    /// Appends one message per problem, each prefixed with the row location.
    fn validate(&self, location: &str, errors: &mut Vec<String>);
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnitRow {
    #[serde(rename = "nome", default, deserialize_with = "de::text")]
    pub name: String,
    #[serde(rename = "codigo", default, deserialize_with = "de::text")]
    pub code: String,
    #[serde(rename = "ativo", default, deserialize_with = "de::opt_flag")]
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttendantRow {
    #[serde(rename = "nome", default, deserialize_with = "de::text")]
    pub name: String,
    #[serde(default, deserialize_with = "de::text")]
    pub email: String,
    #[serde(rename = "unidade_codigo", default, deserialize_with = "de::text")]
    pub unit_code: String,
    #[serde(rename = "ativo", default, deserialize_with = "de::opt_flag")]
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnitMetricRow {
    #[serde(rename = "mes_ano", default, deserialize_with = "de::text")]
    pub period: String,
    #[serde(rename = "unidade_codigo", default, deserialize_with = "de::text")]
    pub unit_code: String,
    #[serde(rename = "faturamento_total", default, deserialize_with = "de::opt_number")]
    pub total_revenue: Option<f64>,
    #[serde(rename = "pacientes_atendidos", default, deserialize_with = "de::opt_integer")]
    pub patients_served: Option<i64>,
    #[serde(rename = "exames_vendidos", default, deserialize_with = "de::opt_integer")]
    pub exams_sold: Option<i64>,
    #[serde(rename = "nps", default, deserialize_with = "de::opt_integer")]
    pub nps_score: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttendantMetricRow {
    #[serde(rename = "mes_ano", default, deserialize_with = "de::text")]
    pub period: String,
    #[serde(rename = "unidade_codigo", default, deserialize_with = "de::text")]
    pub unit_code: String,
    #[serde(rename = "atendente_email", default, deserialize_with = "de::text")]
    pub attendant_email: String,
    #[serde(rename = "faturamento_total", default, deserialize_with = "de::opt_number")]
    pub total_revenue: Option<f64>,
    #[serde(rename = "orcamentos_registrados", default, deserialize_with = "de::opt_number")]
    pub budgets_registered: Option<f64>,
    #[serde(rename = "orcamentos_convertidos", default, deserialize_with = "de::opt_number")]
    pub budgets_converted: Option<f64>,
    #[serde(rename = "exames_vendidos", default, deserialize_with = "de::opt_integer")]
    pub exams_sold: Option<i64>,
    #[serde(rename = "pacientes_atendidos", default, deserialize_with = "de::opt_integer")]
    pub patients_served: Option<i64>,
    #[serde(rename = "ticket_medio_exame", default, deserialize_with = "de::opt_number")]
    pub average_ticket_per_exam: Option<f64>,
    #[serde(rename = "ticket_medio_paciente", default, deserialize_with = "de::opt_number")]
    pub average_ticket_per_patient: Option<f64>,
    #[serde(rename = "nps", default, deserialize_with = "de::opt_integer")]
    pub nps_score: Option<i64>,
}

impl ImportRow for UnitRow {
    fn validate(&self, location: &str, errors: &mut Vec<String>) {
        validate::required_text(location, "nome", &self.name, errors);
        validate::required_text(location, "codigo", &self.code, errors);
    }
}

impl ImportRow for AttendantRow {
    fn validate(&self, location: &str, errors: &mut Vec<String>) {
        validate::required_text(location, "nome", &self.name, errors);
        validate::email(location, "email", &self.email, errors);
        validate::required_text(location, "unidade_codigo", &self.unit_code, errors);
    }
}

impl ImportRow for UnitMetricRow {
    fn validate(&self, location: &str, errors: &mut Vec<String>) {
        validate::period(location, "mes_ano", &self.period, errors);
        validate::required_text(location, "unidade_codigo", &self.unit_code, errors);
        validate::required_amount(location, "faturamento_total", self.total_revenue, errors);
        validate::non_negative_count(location, "pacientes_atendidos", self.patients_served, errors);
        validate::non_negative_count(location, "exames_vendidos", self.exams_sold, errors);
        validate::nps(location, "nps", self.nps_score, errors);
    }
}

impl ImportRow for AttendantMetricRow {
    fn validate(&self, location: &str, errors: &mut Vec<String>) {
        validate::period(location, "mes_ano", &self.period, errors);
        validate::required_text(location, "unidade_codigo", &self.unit_code, errors);
        validate::email(location, "atendente_email", &self.attendant_email, errors);
        validate::optional_amount(location, "faturamento_total", self.total_revenue, errors);
        validate::required_amount(location, "orcamentos_registrados", self.budgets_registered, errors);
        validate::required_amount(location, "orcamentos_convertidos", self.budgets_converted, errors);
        validate::non_negative_count(location, "exames_vendidos", self.exams_sold, errors);
        validate::non_negative_count(location, "pacientes_atendidos", self.patients_served, errors);
        validate::optional_amount(location, "ticket_medio_exame", self.average_ticket_per_exam, errors);
        validate::optional_amount(
            location,
            "ticket_medio_paciente",
            self.average_ticket_per_patient,
            errors,
        );
        validate::nps(location, "nps", self.nps_score, errors);
    }
}

/// One category's rows after decoding and validation.
#[derive(Debug, Clone)]
pub enum CategoryRecords {
    Units(Vec<UnitRow>),
    Attendants(Vec<AttendantRow>),
    UnitMetrics(Vec<UnitMetricRow>),
    AttendantMetrics(Vec<AttendantMetricRow>),
}

impl CategoryRecords {
    /// Decodes and validates every row; any problem rejects the whole category.
    pub fn parse(category: Category, values: &[Value]) -> Result<Self, Vec<String>> {
        Ok(match category {
            Category::Units => Self::Units(parse_rows(category, values)?),
            Category::Attendants => Self::Attendants(parse_rows(category, values)?),
            Category::UnitMetrics => Self::UnitMetrics(parse_rows(category, values)?),
            Category::AttendantMetrics => Self::AttendantMetrics(parse_rows(category, values)?),
        })
    }
}

fn parse_rows<T: ImportRow>(category: Category, values: &[Value]) -> Result<Vec<T>, Vec<String>> {
    let mut rows = Vec::with_capacity(values.len());
    let mut errors = Vec::new();

    for (index, value) in values.iter().enumerate() {
        let location = format!("{}[{}]", category.key(), index);
        if !value.is_object() {
            errors.push(format!("{location}: expected an object"));
            continue;
        }
        match T::deserialize(value) {
            Ok(row) => {
                row.validate(&location, &mut errors);
                rows.push(row);
            }
            Err(err) => errors.push(format!("{location}: {err}")),
        }
    }

    if errors.is_empty() {
        Ok(rows)
    } else {
        Err(errors)
    }
}

/// Lenient field decoders for `#[serde(deserialize_with = "de::...")]`.
pub mod de {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// "  A1 " → "A1", 101 → "101", null → ""
    pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(String::new()),
            Value::String(s) => Ok(s.trim().to_string()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(D::Error::custom(format!("expected text, found {other}"))),
        }
    }

    /// 12.5 → Some(12.5), "1234,56" → Some(1234.56), "" → None
    pub fn opt_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(None),
            Value::Number(n) => n
                .as_f64()
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid number {n}"))),
            Value::String(s) => parse_decimal(&s).map_err(D::Error::custom),
            other => Err(D::Error::custom(format!("expected a number, found {other}"))),
        }
    }

    /// 7 → Some(7), "7" → Some(7), 7.0 → Some(7), 7.5 → error
    pub fn opt_integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let number = opt_number(deserializer)?;
        match number {
            None => Ok(None),
            Some(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => Ok(Some(n as i64)),
            Some(n) => Err(D::Error::custom(format!("expected a whole number, found {n}"))),
        }
    }

    /// true / "true" / "1" / "sim" → Some(true), "" → None
    pub fn opt_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(b)),
            Value::Number(n) => Ok(Some(n.as_f64().unwrap_or(0.0) != 0.0)),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "" => Ok(None),
                "true" | "1" | "sim" | "s" | "yes" | "y" => Ok(Some(true)),
                "false" | "0" | "nao" | "não" | "n" | "no" => Ok(Some(false)),
                other => Err(D::Error::custom(format!("expected true or false, found '{other}'"))),
            },
            other => Err(D::Error::custom(format!("expected true or false, found {other}"))),
        }
    }

    fn parse_decimal(raw: &str) -> Result<Option<f64>, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let normalized = if trimmed.contains(',') && !trimmed.contains('.') {
            trimmed.replace(',', ".")
        } else {
            trimmed.replace(',', "")
        };
        normalized
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Some)
            .ok_or_else(|| format!("invalid number '{trimmed}'"))
    }
}
