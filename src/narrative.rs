//! Narrative generation through an OpenAI-style chat endpoint.
//!
//! The chart is serialized to a structured JSON payload that is always
//! embedded in the prompt. The model is expected to answer in JSON; if it
//! answers with prose or asks for the data instead, one retry injects the
//! payload verbatim, and a deterministic local reading covers the case where
//! no model is reachable at all.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::env;
use std::time::Duration;

use crate::{AstrologyError, BirthInfo, Horoscope};

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_TOKENS: u32 = 1200;

const SYSTEM_PROMPT: &str =
    "You are an expert Vedic astrologer and write in a culturally sensitive manner.";

const PROMPT_TEMPLATE: &str = "You are an experienced Vedic astrologer. Reply in JSON only with \
keys: {\"headline\":\"\",\"bullets\":[],\"narrative\":\"\",\"yogas\":[],\"dasas\":{}}.\n\n\
Please analyze the following chart. Input:\n{input}\n";

/// Parsed reading. Every field defaults so a partial model answer still
/// deserializes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub bullets: Vec<String>,
    #[serde(default)]
    pub narrative: String,
    #[serde(default)]
    pub yogas: Vec<String>,
    #[serde(default)]
    pub dasas: Value,
}

/// Structured payload sent to the model: placements, ascendant, navamsa,
/// detected yogas and the dasa timeline.
pub fn structured_payload(horoscope: &Horoscope, birth_info: &BirthInfo) -> Value {
    let rasi: serde_json::Map<String, Value> = horoscope
        .chart
        .positions
        .values()
        .map(|p| {
            (
                p.body.name().to_string(),
                json!({
                    "lon": p.longitude,
                    "rasi": p.sign().index() + 1,
                    "deg": p.degree_in_sign(),
                }),
            )
        })
        .collect();
    let navamsa: serde_json::Map<String, Value> = horoscope
        .navamsa
        .iter()
        .map(|(body, sign)| (body.name().to_string(), json!(sign.index() + 1)))
        .collect();
    let yogas: Vec<String> = horoscope
        .yogas
        .iter()
        .map(|m| m.yoga.name().to_string())
        .collect();
    json!({
        "meta": {
            "datetime": birth_info.date_time.to_rfc3339(),
            "lat": birth_info.location.latitude,
            "lon": birth_info.location.longitude,
        },
        "asc": horoscope.chart.ascendant_longitude,
        "rasi": rasi,
        "navamsa": navamsa,
        "yogas": yogas,
        "dasas": horoscope.dasa,
    })
}

// ---------------------------
// ## Engine
// ---------------------------

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

pub struct NarrativeEngine {
    client: reqwest::blocking::Client,
    api_key: Option<String>,
    model: String,
    api_base: String,
}

impl NarrativeEngine {
    /// Configuration from the environment: `OPENAI_API_KEY`, `ASTRO_MODEL`,
    /// `ASTRO_API_BASE`.
    pub fn from_env() -> Result<Self, AstrologyError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AstrologyError::Generation(e.to_string()))?;
        Ok(NarrativeEngine {
            client,
            api_key: env::var("OPENAI_API_KEY").ok(),
            model: env::var("ASTRO_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            api_base: env::var("ASTRO_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
        })
    }

    /// Generate a reading, surfacing provider failures as
    /// [`AstrologyError::Generation`]. A model that answers but never yields
    /// usable JSON is not an error; its text becomes the narrative.
    pub fn try_generate(&self, payload: &Value) -> Result<Analysis, AstrologyError> {
        let input = serde_json::to_string_pretty(payload)
            .map_err(|e| AstrologyError::Generation(e.to_string()))?;
        let prompt = PROMPT_TEMPLATE.replace("{input}", &input);

        let text = self.call_model(&prompt)?;
        if let Some(analysis) = extract_json(&text).and_then(parse_analysis) {
            return Ok(analysis);
        }

        // The model answered with prose or asked for the data; retry once
        // with the payload injected at the top of the prompt.
        let injected = format!(
            "Proceed using the following structured JSON (do not ask for it again). \
Use it to produce JSON with keys: headline, bullets, narrative, yogas, dasas.\n\n{}",
            input
        );
        let retry_text = self.call_model(&injected)?;
        if let Some(analysis) = extract_json(&retry_text).and_then(parse_analysis) {
            return Ok(analysis);
        }

        let narrative = if retry_text.trim().is_empty() { text } else { retry_text };
        Ok(Analysis {
            narrative,
            ..Analysis::default()
        })
    }

    /// Like [`try_generate`](Self::try_generate) but never fails: provider
    /// errors are logged and replaced by the local fallback reading.
    pub fn generate_or_fallback(&self, payload: &Value) -> Analysis {
        match self.try_generate(payload) {
            Ok(analysis) => analysis,
            Err(err) => {
                tracing::warn!(error = %err, "narrative generation failed, using fallback");
                fallback_analysis(payload)
            }
        }
    }

    fn call_model(&self, prompt: &str) -> Result<String, AstrologyError> {
        let Some(api_key) = &self.api_key else {
            return Err(AstrologyError::Generation(
                "no OPENAI_API_KEY configured".into(),
            ));
        };
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: prompt },
            ],
            max_tokens: MAX_TOKENS,
        };
        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .map_err(|e| AstrologyError::Generation(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AstrologyError::Generation(format!(
                "provider returned status {}",
                response.status()
            )));
        }
        let parsed: ChatResponse = response
            .json()
            .map_err(|e| AstrologyError::Generation(e.to_string()))?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

fn parse_analysis(value: Value) -> Option<Analysis> {
    serde_json::from_value(value).ok()
}

/// Find a JSON object in free-form model output: plain JSON first, then the
/// first balanced `{...}` block with trailing commas and backticks stripped.
pub fn extract_json(text: &str) -> Option<Value> {
    if text.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return value.is_object().then_some(value);
    }
    let start = text.find('{')?;
    let mut depth = 0usize;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let candidate = &text[start..start + offset + ch.len_utf8()];
                    let cleaned = strip_trailing_commas(candidate.trim_matches(&['`', ' ', '\n', '\r', '\t'][..]));
                    return serde_json::from_str(&cleaned).ok();
                }
            }
            _ => {}
        }
    }
    None
}

// Remove commas that directly precede a closing brace or bracket; a common
// model output defect that strict JSON parsing rejects.
fn strip_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_comma = false;
    let mut pending_ws = String::new();
    for ch in text.chars() {
        match ch {
            ',' => {
                if pending_comma {
                    out.push(',');
                    out.push_str(&pending_ws);
                    pending_ws.clear();
                }
                pending_comma = true;
            }
            c if c.is_whitespace() && pending_comma => pending_ws.push(c),
            '}' | ']' if pending_comma => {
                // Drop the comma, keep the whitespace.
                out.push_str(&pending_ws);
                pending_ws.clear();
                pending_comma = false;
                out.push(ch);
            }
            c => {
                if pending_comma {
                    out.push(',');
                    out.push_str(&pending_ws);
                    pending_ws.clear();
                    pending_comma = false;
                }
                out.push(c);
            }
        }
    }
    if pending_comma {
        out.push(',');
        out.push_str(&pending_ws);
    }
    out
}

/// Deterministic local reading built straight from the payload.
pub fn fallback_analysis(payload: &Value) -> Analysis {
    let headline = "Basic horoscope overview (local fallback)".to_string();
    let mut bullets = Vec::new();
    if let Some(rasi) = payload.get("rasi").and_then(Value::as_object) {
        for (name, info) in rasi {
            if bullets.len() >= 6 {
                break;
            }
            let sign = info.get("rasi").and_then(Value::as_u64).unwrap_or(0);
            let deg = info.get("deg").and_then(Value::as_f64).unwrap_or(0.0);
            bullets.push(format!("{}: sign {}, {:.1}\u{b0}", name, sign, deg));
        }
    }
    let yogas: Vec<String> = payload
        .get("yogas")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let narrative = format!(
        "{}\n\nKey placements: {}.\n\nThis is an automated fallback reading.",
        headline,
        bullets.join("; ")
    );
    Analysis {
        headline,
        bullets,
        narrative,
        yogas,
        dasas: payload.get("dasas").cloned().unwrap_or(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CelestialBody, Chart, Location};
    use chrono::TimeZone;

    fn sample_payload() -> Value {
        let chart = Chart::new(
            15.0,
            [
                (CelestialBody::Moon, 20.0),
                (CelestialBody::Jupiter, 105.0),
            ],
        )
        .unwrap();
        let birth = chrono::Utc.with_ymd_and_hms(1996, 10, 15, 12, 25, 0).unwrap();
        let horoscope = Horoscope::from_chart(chart, birth);
        let birth_info = BirthInfo {
            date_time: birth,
            location: Location::chennai(),
        };
        structured_payload(&horoscope, &birth_info)
    }

    #[test]
    fn payload_carries_placements_and_dasas() {
        let payload = sample_payload();
        assert_eq!(payload["rasi"]["Moon"]["rasi"], 1);
        assert_eq!(payload["rasi"]["Jupiter"]["rasi"], 4);
        assert_eq!(payload["asc"], 15.0);
        // Moon at 20 degrees is mid-Bharani, so a Venus dasa is attached.
        assert_eq!(payload["dasas"]["current"], "Venus");
    }

    #[test]
    fn extract_plain_json() {
        let value = extract_json(r#"{"headline":"hi","bullets":[]}"#).unwrap();
        assert_eq!(value["headline"], "hi");
    }

    #[test]
    fn extract_embedded_json_with_trailing_comma() {
        let text = "Here you go:\n```\n{\"headline\":\"ok\",\"bullets\":[\"a\",],}\n```";
        let value = extract_json(text).unwrap();
        assert_eq!(value["headline"], "ok");
        assert_eq!(value["bullets"][0], "a");
    }

    #[test]
    fn extract_rejects_plain_prose() {
        assert!(extract_json("please provide the chart json").is_none());
        assert!(extract_json("").is_none());
    }

    #[test]
    fn trailing_comma_stripping_preserves_interior_commas() {
        assert_eq!(strip_trailing_commas(r#"{"a":1,"b":2}"#), r#"{"a":1,"b":2}"#);
        assert_eq!(strip_trailing_commas("[1, 2, ]"), "[1, 2 ]");
    }

    #[test]
    fn partial_model_output_still_deserializes() {
        let analysis = parse_analysis(serde_json::json!({"headline": "only this"})).unwrap();
        assert_eq!(analysis.headline, "only this");
        assert!(analysis.bullets.is_empty());
        assert!(analysis.narrative.is_empty());
    }

    #[test]
    fn fallback_reads_the_payload() {
        let analysis = fallback_analysis(&sample_payload());
        assert!(analysis.headline.contains("fallback"));
        assert!(analysis.bullets.iter().any(|b| b.starts_with("Moon")));
        assert!(analysis.narrative.contains("Key placements"));
    }
}
