// smart chat - decide whether a question needs data, fetch it, answer with it
//
// START -> route -> direct answer
//                -> fetch -> summarize -> answer
//
// every stage fails the whole request with its own error kind, nothing is retried
// and an unsafe query never degrades into a direct answer

use super::ai::{Completion, CompletionRequest, LanguageModel, Usage};
use super::extract::extract_query;
use super::record::Record;
use super::safety::Safety;
use super::store::{MAX_ROWS, ReadRequest, RecordStore};
use super::summary::summarize;
use super::table::{DEFAULT_TABLE, resolve_table_or};
use crate::Error;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Exact reply the routing prompt asks for when no data is needed.
pub const NO_DATABASE_NEEDED: &str = "NO_DATABASE_NEEDED";

const ROUTING_PROMPT: &str = r#"You are a credit analysis assistant that writes SQL.

TABLES:
- clientes: nome, score_credito, classe_risco, tipo_pessoa, renda_mensal
- analises_credito: decisao, valor_solicitado, valor_aprovado, cliente_id
- operacoes_credito: valor_contratado, status, modalidade, dias_atraso, cliente_id
- historico_pagamentos: status, valor_pago, dias_atraso, operacao_id
- modalidades_credito: nome, categoria, taxa_minima, taxa_maxima
- score_historico: score_atual, score_anterior, cliente_id

RULES:
1. Only a single SELECT statement is allowed
2. Always use LIMIT (max 50)
3. If the question needs data, reply EXACTLY "SQL: <query without formatting>"
4. If it does not, reply "NO_DATABASE_NEEDED"
5. Do NOT use markdown, code blocks or any formatting

EXAMPLE: SQL: SELECT nome FROM clientes LIMIT 10"#;

const DIRECT_PROMPT: &str = r#"You are an assistant specialized in credit analysis and financial services.

Answer questions about:
- Credit and financing concepts
- Risk analysis
- Credit scores
- Loan modalities
- Financial education

Be professional, clear and informative."#;

/// Knobs for one pipeline, fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub model: String,
    /// Budget for plain chat, which skips routing.
    pub chat_max_tokens: u32,
    pub routing_max_tokens: u32,
    pub routing_temperature: f32,
    pub direct_max_tokens: u32,
    pub answer_max_tokens: u32,
    pub temperature: f32,
    /// Rows requested from storage, never above 50.
    pub row_cap: u32,
    /// Rows kept for the summary.
    pub summary_rows: usize,
    pub order_by: String,
    pub fallback_table: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            chat_max_tokens: 150,
            routing_max_tokens: 150,
            routing_temperature: 0.1,
            direct_max_tokens: 300,
            answer_max_tokens: 400,
            temperature: 0.7,
            row_cap: MAX_ROWS,
            summary_rows: 10,
            order_by: "created_at".to_string(),
            fallback_table: DEFAULT_TABLE.to_string(),
        }
    }
}

/// Per-request overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AskOptions {
    /// Used for every model call in the request.
    pub model: Option<String>,
    /// Output budget for the final answer; routing keeps its own.
    pub max_tokens: Option<u32>,
    pub order_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDecision {
    Direct,
    /// Only built from a query that passed [`Safety::check`].
    Database { query: String },
}

impl RoutingDecision {
    pub fn needs_data(&self) -> bool {
        matches!(self, RoutingDecision::Database { .. })
    }

    pub fn query(&self) -> Option<&str> {
        match self {
            RoutingDecision::Direct => None,
            RoutingDecision::Database { query } => Some(query),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SmartAnswer {
    pub message: String,
    pub used_database: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_query: Option<String>,
    pub records_found: usize,
    pub usage: Usage,
    pub created_at: DateTime<Utc>,
}

pub struct SmartChat {
    llm: Arc<dyn LanguageModel>,
    store: Arc<dyn RecordStore>,
    config: PipelineConfig,
}

impl SmartChat {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        store: Arc<dyn RecordStore>,
        config: PipelineConfig,
    ) -> Self {
        Self { llm, store, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the whole pipeline for one question.
    pub async fn answer(&self, question: &str, options: &AskOptions) -> Result<SmartAnswer, Error> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidInput("message is required".to_string()));
        }

        let model = options.model.as_deref().unwrap_or(&self.config.model);
        let mut usage = Usage::default();

        let (decision, routing_usage) = self.route(question, model).await?;
        usage += routing_usage;

        let (message, records_found) = match decision.query() {
            None => {
                let completion = self.direct_answer(question, model, options).await?;
                usage += completion.usage;
                (completion.text, 0)
            }
            Some(query) => {
                let mut records = self.fetch(query, options).await?;
                let found = records.len();
                records.truncate(self.config.summary_rows);

                let completion = self.data_answer(question, &records, model, options).await?;
                usage += completion.usage;
                (completion.text, found)
            }
        };

        Ok(SmartAnswer {
            message,
            used_database: decision.needs_data(),
            sql_query: decision.query().map(str::to_string),
            records_found,
            usage,
            created_at: Utc::now(),
        })
    }

    /// Forward a message straight to the model: no routing, no system prompt.
    pub async fn chat(&self, message: &str, options: &AskOptions) -> Result<Completion, Error> {
        if message.trim().is_empty() {
            return Err(Error::InvalidInput("message is required".to_string()));
        }

        self.llm
            .complete(CompletionRequest {
                system: None,
                user: message.to_string(),
                model: options
                    .model
                    .clone()
                    .unwrap_or_else(|| self.config.model.clone()),
                max_tokens: options.max_tokens.unwrap_or(self.config.chat_max_tokens),
                temperature: self.config.temperature,
            })
            .await
            .map_err(|e| Error::AnswerSynthesis(e.to_string()))
    }

    /// Like [`answer`](Self::answer), but gives up as soon as `cancel` resolves.
    /// The in-flight remote call is dropped with the pipeline.
    pub async fn answer_or_cancel<F>(
        &self,
        question: &str,
        options: &AskOptions,
        cancel: F,
    ) -> Result<SmartAnswer, Error>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            _ = cancel => Err(Error::Cancelled),
            result = self.answer(question, options) => result,
        }
    }

    /// Ask the model whether the question needs data and vet the query it wrote.
    pub async fn route(
        &self,
        question: &str,
        model: &str,
    ) -> Result<(RoutingDecision, Usage), Error> {
        let completion = self
            .llm
            .complete(CompletionRequest {
                system: Some(ROUTING_PROMPT.to_string()),
                user: question.to_string(),
                model: model.to_string(),
                max_tokens: self.config.routing_max_tokens,
                temperature: self.config.routing_temperature,
            })
            .await
            .map_err(|e| Error::Routing(e.to_string()))?;

        let reply = completion.text.trim();
        debug!(reply, "routing reply");

        if reply == NO_DATABASE_NEEDED {
            info!("question answered without data");
            return Ok((RoutingDecision::Direct, completion.usage));
        }

        let query = extract_query(reply);
        if query.is_empty() {
            warn!(reply, "routing reply has no query");
            return Err(Error::Routing(
                "model reply contained neither a query nor NO_DATABASE_NEEDED".to_string(),
            ));
        }

        let safety = Safety::check(&query);
        if !safety.is_safe {
            warn!(%query, reason = %safety.reason, "rejected generated query");
            return Err(Error::Routing(format!(
                "invalid or unsafe SQL query generated: {}",
                safety.reason
            )));
        }

        info!(%query, "question needs data");
        Ok((RoutingDecision::Database { query }, completion.usage))
    }

    // bounded read of the table the query names
    async fn fetch(
        &self,
        query: &str,
        options: &AskOptions,
    ) -> Result<Vec<Record>, Error> {
        let table = resolve_table_or(query, &self.config.fallback_table);
        let order_by = options.order_by.as_deref().unwrap_or(&self.config.order_by);
        let request = ReadRequest::latest(&table, self.config.row_cap).order_by(order_by);

        let records = self
            .store
            .read(request)
            .await
            .map_err(|e| Error::DataFetch(e.to_string()))?;

        debug!(%table, rows = records.len(), "fetched records");
        Ok(records)
    }

    async fn direct_answer(
        &self,
        question: &str,
        model: &str,
        options: &AskOptions,
    ) -> Result<Completion, Error> {
        self.llm
            .complete(CompletionRequest {
                system: Some(DIRECT_PROMPT.to_string()),
                user: question.to_string(),
                model: model.to_string(),
                max_tokens: options.max_tokens.unwrap_or(self.config.direct_max_tokens),
                temperature: self.config.temperature,
            })
            .await
            .map_err(|e| Error::AnswerSynthesis(e.to_string()))
    }

    async fn data_answer(
        &self,
        question: &str,
        records: &[Record],
        model: &str,
        options: &AskOptions,
    ) -> Result<Completion, Error> {
        self.llm
            .complete(CompletionRequest {
                system: Some(answer_prompt(question, &summarize(records))),
                user: question.to_string(),
                model: model.to_string(),
                max_tokens: options.max_tokens.unwrap_or(self.config.answer_max_tokens),
                temperature: self.config.temperature,
            })
            .await
            .map_err(|e| Error::AnswerSynthesis(e.to_string()))
    }
}

fn answer_prompt(question: &str, summary: &str) -> String {
    format!(
        r#"You are an assistant specialized in credit analysis.

Using the data below, answer the user's question in a natural, informative way.

INSTRUCTIONS:
- Use the provided data to answer
- Be clear and objective
- Format numbers properly (money as R$ 1.234,56, percentages with %)
- Highlight the important information
- If there is no data, say that no records were found
- Keep the answer under 300 words

QUESTION: {question}

DATA SUMMARY:
{summary}"#
    )
}
