use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::models::{Entry, EntryType, FinancialStats};
use crate::utils::format_decimal;

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    temperature: f32,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

pub struct FinancialAnalyst;

impl FinancialAnalyst {
    /// Asks the configured chat model for a Markdown review of one fiscal year.
    pub async fn analyze(
        config: &AnalysisConfig,
        year_id: &str,
        stats: &FinancialStats,
        entries: &[Entry],
    ) -> Result<String> {
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("AI analysis is not configured"))?;
        let prompt = build_prompt(year_id, stats, entries);
        call_chat(config, api_key, &prompt).await
    }
}

async fn call_chat(config: &AnalysisConfig, api_key: &str, user_prompt: &str) -> Result<String> {
    let client = reqwest::Client::new();
    let request = ChatRequest {
        model: config.model.clone(),
        temperature: 0.3,
        messages: vec![
            Message {
                role: "system".to_string(),
                content: system_prompt(),
            },
            Message {
                role: "user".to_string(),
                content: user_prompt.to_string(),
            },
        ],
    };

    let url = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
    let response = client
        .post(url)
        .bearer_auth(api_key)
        .json(&request)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(anyhow!("Analysis service error {}: {}", status, body));
    }

    let body: ChatResponse = response.json().await?;
    let content = body
        .choices
        .first()
        .ok_or_else(|| anyhow!("Empty response"))?
        .message
        .content
        .trim()
        .to_string();
    Ok(content)
}

pub fn build_prompt(year_id: &str, stats: &FinancialStats, entries: &[Entry]) -> String {
    let expenses = entries
        .iter()
        .filter(|e| e.year_id == year_id && e.entry_type == EntryType::Expense)
        .map(|e| format!("- {}: ${} ({})", e.title, format_decimal(e.amount), e.date))
        .collect::<Vec<_>>();
    let expense_list = if expenses.is_empty() {
        "No expenses recorded yet.".to_string()
    } else {
        expenses.join("\n")
    };

    format!(
        "Analyze the records for the fiscal year {year}.

SUMMARY:
- Opening Balance: ${opening}
- Total Collected: ${collected}
- Total Spent: ${spent}
- Current Net Balance: ${balance}

DETAILED EXPENSES:
{expense_list}

Please provide:
1. A concise executive summary (3 sentences).
2. Top 3 spending categories or patterns noticed.
3. A \"Health Score\" out of 10 for this year's budget management.
4. One strategic suggestion to improve the balance for the next fiscal year.",
        year = year_id,
        opening = format_decimal(stats.opening_balance),
        collected = format_decimal(stats.total_collection),
        spent = format_decimal(stats.total_expense),
        balance = format_decimal(stats.current_balance),
    )
}

fn system_prompt() -> String {
    "You are a professional financial analyst reviewing a community fund. \
Answer in clean Markdown with professional headings."
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expense(title: &str, amount: f64, year_id: &str) -> Entry {
        Entry {
            id: title.to_string(),
            entry_type: EntryType::Expense,
            title: title.to_string(),
            amount,
            date: "2024-04-01".to_string(),
            year_id: year_id.to_string(),
            receipt_image: None,
        }
    }

    fn stats() -> FinancialStats {
        FinancialStats {
            total_collection: 100.0,
            total_expense: 40.0,
            opening_balance: 0.0,
            current_balance: 60.0,
        }
    }

    #[test]
    fn prompt_lists_year_expenses_only() {
        let entries = vec![expense("Chairs", 40.0, "2024"), expense("Old", 1.0, "2023")];

        let prompt = build_prompt("2024", &stats(), &entries);

        assert!(prompt.contains("fiscal year 2024"));
        assert!(prompt.contains("- Chairs: $40.00 (2024-04-01)"));
        assert!(!prompt.contains("Old"));
        assert!(prompt.contains("Current Net Balance: $60.00"));
    }

    #[test]
    fn prompt_mentions_empty_expense_list() {
        let prompt = build_prompt("2024", &stats(), &[]);
        assert!(prompt.contains("No expenses recorded yet."));
    }

    #[tokio::test]
    async fn analysis_requires_api_key() {
        let err = FinancialAnalyst::analyze(&AnalysisConfig::default(), "2024", &stats(), &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }
}
