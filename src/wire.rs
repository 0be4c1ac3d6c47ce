use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::Sink;
use futures::stream;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;
use ulid::Ulid;

use crate::auth::InnkeepAuthSource;
use crate::dates::date_key;
use crate::engine::{effective_fee_percent, Engine, EngineError};
use crate::model::*;
use crate::observability;
use crate::property::PropertyManager;
use crate::sql::{self, BookingFilter, Command};

const DEFAULT_PROPERTY: &str = "default";

pub struct InnkeepHandler {
    properties: Arc<PropertyManager>,
    query_parser: Arc<InnkeepQueryParser>,
}

impl InnkeepHandler {
    pub fn new(properties: Arc<PropertyManager>) -> Self {
        Self {
            properties,
            query_parser: Arc::new(InnkeepQueryParser),
        }
    }

    /// The database name picks the property.
    fn resolve_engine<C: ClientInfo>(&self, client: &C) -> PgWireResult<Arc<Engine>> {
        let db = client
            .metadata()
            .get("database")
            .cloned()
            .unwrap_or_else(|| DEFAULT_PROPERTY.to_string());
        self.properties.get_or_create(&db).map_err(|e| {
            PgWireError::UserError(Box::new(ErrorInfo::new(
                "ERROR".into(),
                "08006".into(),
                format!("property error: {e}"),
            )))
        })
    }

    /// Parse, execute and record metrics for one statement.
    async fn run(&self, engine: &Engine, query: &str) -> PgWireResult<Vec<Response>> {
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        let label = observability::command_label(&cmd);
        let started = Instant::now();
        let result = self.execute_command(engine, cmd).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status).increment(1);
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn execute_command(&self, engine: &Engine, cmd: Command) -> PgWireResult<Vec<Response>> {
        match cmd {
            Command::InsertRoom { id, name, base_price, service_fee_percent } => {
                if engine.get_room_state(&id).is_some() {
                    engine
                        .update_room(id, name, base_price, service_fee_percent)
                        .await
                        .map_err(engine_err)?;
                } else {
                    engine
                        .create_room(id, name, base_price, service_fee_percent)
                        .await
                        .map_err(engine_err)?;
                }
                Ok(vec![insert_tag(1)])
            }
            Command::DeleteRoom { id } => {
                engine.delete_room(id).await.map_err(engine_err)?;
                Ok(vec![delete_tag(1)])
            }
            Command::UpsertSeasonalPrice { room_id, period } => {
                engine.upsert_seasonal_price(room_id, period).await.map_err(engine_err)?;
                Ok(vec![insert_tag(1)])
            }
            Command::DeleteSeasonalPrice { id } => {
                engine.remove_seasonal_price(id).await.map_err(engine_err)?;
                Ok(vec![delete_tag(1)])
            }
            Command::SetAvailability { entries } => {
                let count = entries.len();
                // One merge per (room, availability) group, in first-seen order.
                let mut groups: Vec<(Ulid, bool, Vec<chrono::NaiveDate>)> = Vec::new();
                for (room_id, date, available) in entries {
                    match groups.iter_mut().find(|(r, a, _)| *r == room_id && *a == available) {
                        Some((_, _, dates)) => dates.push(date),
                        None => groups.push((room_id, available, vec![date])),
                    }
                }
                for (room_id, available, dates) in groups {
                    engine.set_dates(room_id, dates, available).await.map_err(engine_err)?;
                }
                Ok(vec![insert_tag(count)])
            }
            Command::ToggleDate { room_id, date } => {
                engine.toggle_date(room_id, date).await.map_err(engine_err)?;
                Ok(vec![insert_tag(1)])
            }
            Command::InsertBooking(req) => {
                engine.create_booking(req).await.map_err(engine_err)?;
                Ok(vec![insert_tag(1)])
            }
            Command::DeleteBooking { id } => {
                engine.delete_booking(id).await.map_err(engine_err)?;
                Ok(vec![delete_tag(1)])
            }
            Command::PaymentSucceeded { booking_id, payment_ref } => {
                engine.confirm_booking(booking_id, payment_ref).await.map_err(engine_err)?;
                Ok(vec![insert_tag(1)])
            }
            Command::PaymentFailed { booking_id, reason } => {
                engine.fail_booking(booking_id, reason).await.map_err(engine_err)?;
                Ok(vec![insert_tag(1)])
            }
            Command::CancelBooking { booking_id } => {
                engine.cancel_booking(booking_id).await.map_err(engine_err)?;
                Ok(vec![insert_tag(1)])
            }
            Command::CompleteBooking { booking_id } => {
                engine.complete_booking(booking_id).await.map_err(engine_err)?;
                Ok(vec![insert_tag(1)])
            }
            Command::SelectRooms => {
                let schema = Arc::new(rooms_schema());
                let mut rows = Vec::new();
                for info in engine.list_rooms().await {
                    let fee = match engine.get_room_state(&info.id) {
                        Some(rs) => effective_fee_percent(&*rs.read().await),
                        None => continue,
                    };
                    let mut encoder = DataRowEncoder::new(schema.clone());
                    encoder.encode_field(&info.id.to_string())?;
                    encoder.encode_field(&info.name)?;
                    encoder.encode_field(&info.base_price.to_string())?;
                    encoder.encode_field(&info.service_fee_percent.map(|p| p.to_string()))?;
                    encoder.encode_field(&fee.to_string())?;
                    rows.push(Ok(encoder.take_row()));
                }
                Ok(vec![query_response(schema, rows)])
            }
            Command::SelectSeasonalPrices { room_id } => {
                let periods = engine.get_seasonal_prices(room_id).await.map_err(engine_err)?;
                let schema = Arc::new(seasonal_prices_schema());
                let rid = room_id.to_string();
                let rows: Vec<PgWireResult<_>> = periods
                    .into_iter()
                    .map(|p| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&p.id.to_string())?;
                        encoder.encode_field(&rid)?;
                        encoder.encode_field(&p.name)?;
                        encoder.encode_field(&date_key(p.start_date))?;
                        encoder.encode_field(&date_key(p.end_date))?;
                        encoder.encode_field(&p.price.to_string())?;
                        encoder.encode_field(&p.description)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![query_response(schema, rows)])
            }
            Command::SelectBookings { filter } => {
                let bookings = match filter {
                    BookingFilter::Room(room_id) => engine.get_bookings(room_id).await,
                    BookingFilter::Id(id) => engine.get_booking(id).await.map(|b| vec![b]),
                }
                .map_err(engine_err)?;
                let schema = Arc::new(bookings_schema());
                let rows: Vec<PgWireResult<_>> = bookings
                    .iter()
                    .map(|b| encode_booking(&schema, b))
                    .collect();
                Ok(vec![query_response(schema, rows)])
            }
            Command::SelectCalendar { room_id, from, to } => {
                let days = engine.calendar_view(room_id, from, to).await.map_err(engine_err)?;
                let schema = Arc::new(calendar_schema());
                let rid = room_id.to_string();
                let rows: Vec<PgWireResult<_>> = days
                    .into_iter()
                    .map(|day| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&rid)?;
                        encoder.encode_field(&date_key(day.date))?;
                        encoder.encode_field(&day.available)?;
                        encoder.encode_field(&day.booking_id.map(|id| id.to_string()))?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![query_response(schema, rows)])
            }
            Command::SelectQuote { room_id, check_in, check_out } => {
                let quote = engine.quote(room_id, check_in, check_out).await.map_err(engine_err)?;
                let nightly = serde_json::to_string(&quote.nightly).map_err(json_err)?;
                let warnings = serde_json::to_string(&quote.warnings).map_err(json_err)?;

                let schema = Arc::new(quote_schema());
                let mut encoder = DataRowEncoder::new(schema.clone());
                encoder.encode_field(&room_id.to_string())?;
                encoder.encode_field(&date_key(quote.stay.check_in))?;
                encoder.encode_field(&date_key(quote.stay.check_out))?;
                encoder.encode_field(&(quote.night_count() as i64))?;
                encoder.encode_field(&quote.subtotal.to_string())?;
                encoder.encode_field(&quote.fee_percent.to_string())?;
                encoder.encode_field(&quote.service_fee.to_string())?;
                encoder.encode_field(&quote.total.to_string())?;
                encoder.encode_field(&nightly)?;
                encoder.encode_field(&warnings)?;
                Ok(vec![query_response(schema, vec![Ok(encoder.take_row())])])
            }
            Command::SelectAvailability { room_id, check_in, check_out } => {
                // Unavailable nights are an answer, not an error.
                let (ok, reason, dates) = match engine.check_availability(room_id, check_in, check_out).await {
                    Ok(()) => (true, None, Vec::new()),
                    Err(e @ (EngineError::CheckInUnavailable { .. } | EngineError::RangeUnavailable { .. })) => {
                        (false, Some(e.to_string()), e.offending_dates())
                    }
                    Err(e) => return Err(engine_err(e)),
                };
                let dates = dates.into_iter().map(date_key).collect::<Vec<_>>().join(",");

                let schema = Arc::new(availability_schema());
                let mut encoder = DataRowEncoder::new(schema.clone());
                encoder.encode_field(&room_id.to_string())?;
                encoder.encode_field(&date_key(check_in))?;
                encoder.encode_field(&date_key(check_out))?;
                encoder.encode_field(&ok)?;
                encoder.encode_field(&reason)?;
                encoder.encode_field(&dates)?;
                Ok(vec![query_response(schema, vec![Ok(encoder.take_row())])])
            }
        }
    }
}

fn insert_tag(rows: usize) -> Response {
    Response::Execution(Tag::new("INSERT").with_rows(rows))
}

fn delete_tag(rows: usize) -> Response {
    Response::Execution(Tag::new("DELETE").with_rows(rows))
}

fn query_response(schema: Arc<Vec<FieldInfo>>, rows: Vec<PgWireResult<pgwire::messages::data::DataRow>>) -> Response {
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

fn encode_booking(schema: &Arc<Vec<FieldInfo>>, b: &Booking) -> PgWireResult<pgwire::messages::data::DataRow> {
    let mut encoder = DataRowEncoder::new(schema.clone());
    encoder.encode_field(&b.id.to_string())?;
    encoder.encode_field(&b.room_id.to_string())?;
    encoder.encode_field(&b.guest.name)?;
    encoder.encode_field(&b.guest.email)?;
    encoder.encode_field(&b.guest.phone)?;
    encoder.encode_field(&b.check_in)?;
    encoder.encode_field(&b.check_out)?;
    encoder.encode_field(&i64::from(b.adults))?;
    encoder.encode_field(&i64::from(b.children))?;
    encoder.encode_field(&b.total_price.to_string())?;
    encoder.encode_field(&b.status.to_string())?;
    encoder.encode_field(&b.payment_status.to_string())?;
    encoder.encode_field(&b.payment_ref)?;
    encoder.encode_field(&b.special_requests)?;
    encoder.encode_field(&b.failure_reason)?;
    encoder.encode_field(&b.created_at)?;
    encoder.encode_field(&b.updated_at)?;
    Ok(encoder.take_row())
}

// ── Schemas ──────────────────────────────────────────────────────

fn field(name: &str, ty: Type) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, ty, FieldFormat::Text)
}

fn rooms_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::VARCHAR),
        field("name", Type::VARCHAR),
        field("base_price", Type::VARCHAR),
        field("service_fee_percent", Type::VARCHAR),
        field("effective_fee_percent", Type::VARCHAR),
    ]
}

fn seasonal_prices_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::VARCHAR),
        field("room_id", Type::VARCHAR),
        field("name", Type::VARCHAR),
        field("start_date", Type::VARCHAR),
        field("end_date", Type::VARCHAR),
        field("price", Type::VARCHAR),
        field("description", Type::VARCHAR),
    ]
}

fn bookings_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::VARCHAR),
        field("room_id", Type::VARCHAR),
        field("guest_name", Type::VARCHAR),
        field("guest_email", Type::VARCHAR),
        field("guest_phone", Type::VARCHAR),
        field("check_in", Type::INT8),
        field("check_out", Type::INT8),
        field("adults", Type::INT8),
        field("children", Type::INT8),
        field("total_price", Type::VARCHAR),
        field("status", Type::VARCHAR),
        field("payment_status", Type::VARCHAR),
        field("payment_ref", Type::VARCHAR),
        field("special_requests", Type::VARCHAR),
        field("failure_reason", Type::VARCHAR),
        field("created_at", Type::INT8),
        field("updated_at", Type::INT8),
    ]
}

fn calendar_schema() -> Vec<FieldInfo> {
    vec![
        field("room_id", Type::VARCHAR),
        field("date", Type::VARCHAR),
        field("available", Type::BOOL),
        field("booking_id", Type::VARCHAR),
    ]
}

fn quote_schema() -> Vec<FieldInfo> {
    vec![
        field("room_id", Type::VARCHAR),
        field("check_in", Type::VARCHAR),
        field("check_out", Type::VARCHAR),
        field("nights", Type::INT8),
        field("subtotal", Type::VARCHAR),
        field("fee_percent", Type::VARCHAR),
        field("service_fee", Type::VARCHAR),
        field("total", Type::VARCHAR),
        field("nightly", Type::VARCHAR),
        field("warnings", Type::VARCHAR),
    ]
}

fn availability_schema() -> Vec<FieldInfo> {
    vec![
        field("room_id", Type::VARCHAR),
        field("check_in", Type::VARCHAR),
        field("check_out", Type::VARCHAR),
        field("ok", Type::BOOL),
        field("reason", Type::VARCHAR),
        field("dates", Type::VARCHAR),
    ]
}

/// Result columns of a statement, found from the table after `FROM`.
/// Anything that is not a SELECT has none.
fn result_schema(sql: &str) -> Vec<FieldInfo> {
    let lower = sql.to_lowercase();
    if !lower.trim_start().starts_with("select") {
        return vec![];
    }
    let mut words = lower.split(|c: char| c.is_whitespace() || c == ';');
    let table = words
        .by_ref()
        .find(|w| *w == "from")
        .and_then(|_| words.find(|w| !w.is_empty()));
    match table {
        Some("rooms") => rooms_schema(),
        Some("seasonal_prices") => seasonal_prices_schema(),
        Some("bookings") => bookings_schema(),
        Some("calendar") => calendar_schema(),
        Some("quote") => quote_schema(),
        Some("availability") => availability_schema(),
        _ => vec![],
    }
}

#[async_trait]
impl SimpleQueryHandler for InnkeepHandler {
    async fn do_query<C>(&self, client: &mut C, query: &str) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        self.run(&engine, query).await
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct InnkeepQueryParser;

#[async_trait]
impl QueryParser for InnkeepQueryParser {
    type Statement = String;

    async fn parse_sql<C>(&self, _client: &C, sql: &str, _types: &[Option<Type>]) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(&self, stmt: &String, _column_format: Option<&Format>) -> PgWireResult<Vec<FieldInfo>> {
        Ok(result_schema(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for InnkeepHandler {
    type Statement = String;
    type QueryParser = InnkeepQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        let sql = substitute_params(portal);
        let mut responses = self.run(&engine, &sql).await?;
        if responses.is_empty() {
            return Ok(Response::EmptyQuery);
        }
        Ok(responses.remove(0))
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(param_types, result_schema(&target.statement)))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(result_schema(&target.statement.statement)))
    }
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let mut max = 0usize;
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            i += 1;
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if let Ok(n) = sql[start..i].parse::<usize>() {
                max = max.max(n);
            }
        } else {
            i += 1;
        }
    }
    max
}

fn substitute_params(portal: &Portal<String>) -> String {
    substitute(&portal.statement.statement, portal.parameters.as_slice())
}

/// Replace `$n` placeholders with bound text-format values in one left-to-right pass.
/// Inserted values are never rescanned; placeholders inside quoted literals and
/// indexes with no bound value are left as written.
fn substitute<B: AsRef<[u8]>>(sql: &str, params: &[Option<B>]) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.char_indices().peekable();
    let mut in_literal = false;
    while let Some((_, c)) = chars.next() {
        if c == '\'' {
            in_literal = !in_literal;
        }
        if c != '$' || in_literal {
            out.push(c);
            continue;
        }
        let mut digits = String::new();
        while let Some(&(_, d)) = chars.peek() {
            if !d.is_ascii_digit() {
                break;
            }
            digits.push(d);
            chars.next();
        }
        let param = digits
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| params.get(i));
        match param {
            Some(Some(bytes)) => {
                let text = String::from_utf8_lossy(bytes.as_ref());
                out.push('\'');
                out.push_str(&text.replace('\'', "''"));
                out.push('\'');
            }
            Some(None) => out.push_str("NULL"),
            None => {
                out.push('$');
                out.push_str(&digits);
            }
        }
    }
    out
}

// ── Factory ──────────────────────────────────────────────────────

pub struct InnkeepFactory {
    handler: Arc<InnkeepHandler>,
    auth_handler: Arc<CleartextPasswordAuthStartupHandler<InnkeepAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl InnkeepFactory {
    pub fn new(properties: Arc<PropertyManager>, password: String) -> Self {
        let auth_source = InnkeepAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(InnkeepHandler::new(properties)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(auth_source, param_provider)),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for InnkeepFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection until it closes.
pub async fn process_connection(
    socket: TcpStream,
    properties: Arc<PropertyManager>,
    password: String,
    tls: Option<TlsAcceptor>,
) -> std::io::Result<()> {
    let factory = Arc::new(InnkeepFactory::new(properties, password));
    pgwire::tokio::process_socket(socket, tls, factory).await
}

// ── Errors ───────────────────────────────────────────────────────

/// SQLSTATE for an engine error.
fn sqlstate(e: &EngineError) -> &'static str {
    match e {
        EngineError::InvalidRange { .. } | EngineError::InvalidPrice { .. } | EngineError::InvalidInput(_) => {
            "22023"
        }
        EngineError::SeasonalConflict { .. }
        | EngineError::CheckInUnavailable { .. }
        | EngineError::RangeUnavailable { .. }
        | EngineError::StaleAvailability { .. }
        | EngineError::AlreadyExists(_)
        | EngineError::RoomInUse(_) => "23P01",
        EngineError::RoomNotFound(_) | EngineError::BookingNotFound(_) | EngineError::SeasonalPriceNotFound(_) => {
            "02000"
        }
        EngineError::InvalidTransition { .. } => "55000",
        EngineError::LimitExceeded(_) => "54000",
        EngineError::WalError(_) => "58030",
    }
}

fn engine_err(e: EngineError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        sqlstate(&e).into(),
        e.to_string(),
    )))
}

fn sql_err(e: sql::SqlError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "42601".into(),
        e.to_string(),
    )))
}

fn json_err(e: serde_json::Error) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "XX000".into(),
        format!("encoding error: {e}"),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::d;

    #[test]
    fn count_params_finds_highest() {
        assert_eq!(count_params("SELECT * FROM rooms"), 0);
        assert_eq!(count_params("INSERT INTO toggles (room_id, date) VALUES ($1, $2)"), 2);
        assert_eq!(count_params("VALUES ($3, $1, $12)"), 12);
        assert_eq!(count_params("price $"), 0);
    }

    #[test]
    fn bound_values_are_not_rescanned() {
        let mut params: Vec<Option<&str>> = vec![Some("x"); 11];
        params[0] = Some("costs $1 or $10");
        params[9] = Some("tenth");
        params[10] = None;
        let sql = "INSERT INTO bookings VALUES ($1, $10, $11, $2)";
        assert_eq!(
            substitute(sql, &params),
            "INSERT INTO bookings VALUES ('costs $1 or $10', 'tenth', NULL, 'x')"
        );
    }

    #[test]
    fn substitution_leaves_literals_and_unbound_indexes() {
        let params = [Some("O'Brien")];
        assert_eq!(
            substitute("SELECT '$1', $1, $2, $", &params),
            "SELECT '$1', 'O''Brien', $2, $"
        );
    }

    #[test]
    fn result_schema_by_table() {
        let names = |sql: &str| -> Vec<String> {
            result_schema(sql).iter().map(|f| f.name().to_string()).collect()
        };
        assert_eq!(names("SELECT * FROM quote WHERE room_id = $1")[7], "total");
        assert_eq!(names("select * from  calendar where room_id = $1").len(), 4);
        assert_eq!(names("SELECT * FROM availability WHERE room_id = $1")[3], "ok");
        assert!(names("INSERT INTO availability (room_id, date, available) VALUES ($1, $2, $3)").is_empty());
        assert!(names("SELECT * FROM nowhere").is_empty());
    }

    #[test]
    fn sqlstate_classes() {
        let rid = Ulid::new();
        assert_eq!(sqlstate(&EngineError::InvalidRange { check_in: d("2025-01-02"), check_out: d("2025-01-01") }), "22023");
        assert_eq!(sqlstate(&EngineError::RangeUnavailable { dates: vec![d("2025-01-01")] }), "23P01");
        assert_eq!(sqlstate(&EngineError::StaleAvailability { booking_id: rid, dates: vec![] }), "23P01");
        assert_eq!(sqlstate(&EngineError::RoomNotFound(rid)), "02000");
        assert_eq!(
            sqlstate(&EngineError::InvalidTransition { id: rid, from: BookingStatus::Completed, action: "cancel" }),
            "55000"
        );
        assert_eq!(sqlstate(&EngineError::LimitExceeded("stay too long")), "54000");
        assert_eq!(sqlstate(&EngineError::WalError("disk full".into())), "58030");
    }
}
