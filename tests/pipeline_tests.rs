// tests for the smart chat pipeline, with in-process collaborators

use async_trait::async_trait;
use smartql::{
    AskOptions, Completion, CompletionRequest, Error, LanguageModel, NO_DATABASE_NEEDED,
    PipelineConfig, ReadRequest, Record, RecordStore, RoutingDecision, SmartChat, Usage, Value,
    parse_records,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// replies in order, remembers every request
struct FakeModel {
    replies: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<CompletionRequest>>,
    delay: Option<Duration>,
}

impl FakeModel {
    fn new(replies: &[Result<&str, &str>]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(
                replies
                    .iter()
                    .map(|r| match r {
                        Ok(text) => Ok(text.to_string()),
                        Err(e) => Err(e.to_string()),
                    })
                    .collect(),
            ),
            calls: Mutex::new(Vec::new()),
            delay: None,
        })
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            delay: Some(delay),
        })
    }

    fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, Error> {
        self.calls.lock().unwrap().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected model call");

        reply.map_err(Error::Llm).map(|text| Completion {
            text,
            model: request.model,
            usage: Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
        })
    }
}

struct FakeStore {
    rows: Result<Vec<Record>, String>,
    reads: Mutex<Vec<ReadRequest>>,
}

impl FakeStore {
    fn with_rows(n: i64) -> Arc<Self> {
        let rows = (1..=n)
            .map(|i| {
                Record::from([
                    ("nome".to_string(), Value::from(format!("Cliente {i}").as_str())),
                    ("score_credito".to_string(), Value::from(500 + i)),
                ])
            })
            .collect();
        Arc::new(Self {
            rows: Ok(rows),
            reads: Mutex::new(Vec::new()),
        })
    }

    fn failing(msg: &str) -> Arc<Self> {
        Arc::new(Self {
            rows: Err(msg.to_string()),
            reads: Mutex::new(Vec::new()),
        })
    }

    fn reads(&self) -> Vec<ReadRequest> {
        self.reads.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordStore for FakeStore {
    async fn read(&self, request: ReadRequest) -> Result<Vec<Record>, Error> {
        self.reads.lock().unwrap().push(request);
        self.rows.clone().map_err(Error::Storage)
    }
}

// answers every read with a body that is not a list of records
struct GarbledStore;

#[async_trait]
impl RecordStore for GarbledStore {
    async fn read(&self, _: ReadRequest) -> Result<Vec<Record>, Error> {
        Ok(parse_records("<html>502 Bad Gateway</html>")?)
    }
}

fn pipeline(model: &Arc<FakeModel>, store: &Arc<FakeStore>) -> SmartChat {
    SmartChat::new(model.clone(), store.clone(), PipelineConfig::default())
}

#[tokio::test]
async fn test_direct_answer() {
    let model = FakeModel::new(&[
        Ok(NO_DATABASE_NEEDED),
        Ok("O score de crédito mede a probabilidade de pagamento."),
    ]);
    let store = FakeStore::with_rows(3);

    let answer = pipeline(&model, &store)
        .answer("What is the average credit score?", &AskOptions::default())
        .await
        .unwrap();

    assert!(!answer.used_database);
    assert_eq!(answer.sql_query, None);
    assert_eq!(answer.records_found, 0);
    assert!(answer.message.starts_with("O score"));
    assert!(store.reads().is_empty());

    let calls = model.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].max_tokens, 150);
    assert!((calls[0].temperature - 0.1).abs() < f32::EPSILON);
    assert!(calls[0].system.as_deref().unwrap().contains("NO_DATABASE_NEEDED"));
    assert_eq!(calls[1].max_tokens, 300);
    assert!(calls[1].system.as_deref().unwrap().contains("financial services"));
    assert_eq!(calls[1].user, "What is the average credit score?");
}

#[tokio::test]
async fn test_sentinel_with_surrounding_whitespace() {
    let model = FakeModel::new(&[Ok("  NO_DATABASE_NEEDED\n"), Ok("ok")]);
    let store = FakeStore::with_rows(0);

    let answer = pipeline(&model, &store)
        .answer("hello", &AskOptions::default())
        .await
        .unwrap();
    assert!(!answer.used_database);
}

#[tokio::test]
async fn test_data_answer() {
    let model = FakeModel::new(&[
        Ok("SQL: SELECT nome, score_credito FROM clientes LIMIT 10"),
        Ok("Encontrei 12 clientes."),
    ]);
    let store = FakeStore::with_rows(12);

    let answer = pipeline(&model, &store)
        .answer("Quais clientes temos?", &AskOptions::default())
        .await
        .unwrap();

    assert!(answer.used_database);
    assert_eq!(
        answer.sql_query.as_deref(),
        Some("SELECT nome, score_credito FROM clientes LIMIT 10")
    );
    assert_eq!(answer.records_found, 12);
    assert_eq!(answer.message, "Encontrei 12 clientes.");

    let reads = store.reads();
    assert_eq!(reads.len(), 1);
    assert_eq!(reads[0].table, "clientes");
    assert_eq!(reads[0].limit, 50);
    assert_eq!(reads[0].order_by, "created_at");
    assert!(reads[0].descending);

    // only the first 10 rows reach the summary
    let calls = model.calls();
    assert_eq!(calls.len(), 2);
    let system = calls[1].system.as_deref().unwrap();
    assert_eq!(calls[1].max_tokens, 400);
    assert!(system.contains("QUESTION: Quais clientes temos?"));
    assert!(system.contains("Total records: 10"));
    assert!(system.contains("5 more records omitted"));
    assert!(system.contains("R$"));
}

#[tokio::test]
async fn test_data_answer_with_no_rows() {
    let model = FakeModel::new(&[
        Ok("SQL: SELECT decisao FROM analises_credito WHERE valor_solicitado > 1000000"),
        Ok("Nenhum registro encontrado."),
    ]);
    let store = FakeStore::with_rows(0);

    let answer = pipeline(&model, &store)
        .answer("Alguma análise acima de um milhão?", &AskOptions::default())
        .await
        .unwrap();

    assert!(answer.used_database);
    assert_eq!(answer.records_found, 0);
    assert_eq!(store.reads()[0].table, "analises_credito");
    assert!(model.calls()[1]
        .system
        .as_deref()
        .unwrap()
        .contains("No records found."));
}

#[tokio::test]
async fn test_unsafe_query_is_a_routing_failure() {
    let model = FakeModel::new(&[Ok("SQL: DROP TABLE clientes")]);
    let store = FakeStore::with_rows(3);

    let err = pipeline(&model, &store)
        .answer("apague tudo", &AskOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Routing(_)), "{err}");
    assert!(err.to_string().contains("unsafe"));
    assert_eq!(model.calls().len(), 1);
    assert!(store.reads().is_empty());
}

#[tokio::test]
async fn test_reply_without_query_is_a_routing_failure() {
    let model = FakeModel::new(&[Ok("I would look at the clientes table.")]);
    let store = FakeStore::with_rows(3);

    let err = pipeline(&model, &store)
        .answer("quantos clientes?", &AskOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Routing(_)));
    assert_eq!(model.calls().len(), 1);
    assert!(store.reads().is_empty());
}

#[tokio::test]
async fn test_empty_question() {
    for question in ["", "   \n"] {
        let model = FakeModel::new(&[]);
        let store = FakeStore::with_rows(3);

        let err = pipeline(&model, &store)
            .answer(question, &AskOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(model.calls().is_empty());
        assert!(store.reads().is_empty());
    }
}

#[tokio::test]
async fn test_stage_errors() {
    let store = FakeStore::with_rows(1);

    let model = FakeModel::new(&[Err("rate limited")]);
    let err = pipeline(&model, &store)
        .answer("q", &AskOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Routing(_)));
    assert!(err.to_string().contains("rate limited"));

    let model = FakeModel::new(&[Ok(NO_DATABASE_NEEDED), Err("overloaded")]);
    let err = pipeline(&model, &store)
        .answer("q", &AskOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AnswerSynthesis(_)));

    let model = FakeModel::new(&[Ok("SQL: SELECT nome FROM clientes"), Err("overloaded")]);
    let err = pipeline(&model, &store)
        .answer("q", &AskOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AnswerSynthesis(_)));
}

#[tokio::test]
async fn test_storage_failure() {
    let model = FakeModel::new(&[Ok("SQL: SELECT status FROM operacoes_credito LIMIT 5")]);
    let store = FakeStore::failing("relation does not exist");

    let err = pipeline(&model, &store)
        .answer("q", &AskOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::DataFetch(_)));
    assert!(err.to_string().contains("relation does not exist"));
    // no answer call after a failed fetch
    assert_eq!(model.calls().len(), 1);
}

#[tokio::test]
async fn test_unparseable_rows_are_a_fetch_failure() {
    let model = FakeModel::new(&[Ok("SQL: SELECT nome FROM clientes LIMIT 5")]);
    let chat = SmartChat::new(model.clone(), Arc::new(GarbledStore), PipelineConfig::default());

    let err = chat
        .answer("quais clientes?", &AskOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::DataFetch(_)), "{err}");
    assert_eq!(model.calls().len(), 1);
}

#[tokio::test]
async fn test_overrides() {
    let model = FakeModel::new(&[Ok("SQL: SELECT nome FROM clientes"), Ok("ok")]);
    let store = FakeStore::with_rows(2);
    let options = AskOptions {
        model: Some("gpt-4o-mini".to_string()),
        max_tokens: Some(800),
        order_by: Some("score_credito".to_string()),
    };

    pipeline(&model, &store)
        .answer("top clientes", &options)
        .await
        .unwrap();

    let calls = model.calls();
    assert!(calls.iter().all(|c| c.model == "gpt-4o-mini"));
    assert_eq!(calls[0].max_tokens, 150);
    assert_eq!(calls[1].max_tokens, 800);
    assert_eq!(store.reads()[0].order_by, "score_credito");
}

#[tokio::test]
async fn test_usage_is_summed() {
    let model = FakeModel::new(&[Ok("SQL: SELECT nome FROM clientes"), Ok("ok")]);
    let store = FakeStore::with_rows(1);

    let answer = pipeline(&model, &store)
        .answer("q", &AskOptions::default())
        .await
        .unwrap();
    assert_eq!(answer.usage.total_tokens, 30);
}

#[tokio::test]
async fn test_route_only() {
    let model = FakeModel::new(&[Ok("Here: SQL: ```sql\nSELECT nome FROM clientes;\n```")]);
    let store = FakeStore::with_rows(1);

    let (decision, _) = pipeline(&model, &store)
        .route("q", "gpt-3.5-turbo")
        .await
        .unwrap();

    assert_eq!(
        decision,
        RoutingDecision::Database {
            query: "SELECT nome FROM clientes".to_string()
        }
    );
}

#[tokio::test]
async fn test_plain_chat() {
    let model = FakeModel::new(&[Ok("hi there")]);
    let store = FakeStore::with_rows(1);

    let completion = pipeline(&model, &store)
        .chat("hello", &AskOptions::default())
        .await
        .unwrap();

    assert_eq!(completion.text, "hi there");
    let calls = model.calls();
    assert_eq!(calls[0].system, None);
    assert_eq!(calls[0].max_tokens, 150);
    assert!(store.reads().is_empty());
}

#[tokio::test]
async fn test_cancel_before_start() {
    let model = FakeModel::new(&[]);
    let store = FakeStore::with_rows(1);

    let err = pipeline(&model, &store)
        .answer_or_cancel("q", &AskOptions::default(), std::future::ready(()))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert!(model.calls().is_empty());
}

#[tokio::test]
async fn test_cancel_in_flight() {
    let model = FakeModel::slow(Duration::from_secs(60));
    let store = FakeStore::with_rows(1);

    let err = pipeline(&model, &store)
        .answer_or_cancel(
            "q",
            &AskOptions::default(),
            tokio::time::sleep(Duration::from_millis(20)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(model.calls().len(), 1);
}
