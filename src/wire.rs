use std::fmt::Debug;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::StartupHandler;
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
use pgwire::messages::data::DataRow;
use tokio::net::TcpStream;

use crate::engine::{Engine, EngineError};
use crate::model::*;
use crate::observability;
use crate::sql::{self, Command, ReservationFilter, SqlError};

pub struct CaravanHandler {
    engine: Arc<Engine>,
    query_parser: Arc<CaravanQueryParser>,
}

impl CaravanHandler {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            query_parser: Arc::new(CaravanQueryParser),
        }
    }

    async fn execute_command(&self, cmd: Command) -> PgWireResult<Vec<Response>> {
        let label = observability::command_label(&cmd);
        let started = Instant::now();
        let result = self.run(cmd).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status)
            .increment(1);
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn run(&self, cmd: Command) -> PgWireResult<Vec<Response>> {
        let engine = &self.engine;
        match cmd {
            Command::InsertUser {
                id,
                name,
                contact,
                role,
            } => {
                let mut user = User::new(name, contact, role);
                if let Some(id) = id {
                    user.id = id;
                }
                engine.register_user(user).map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::InsertResource {
                id,
                host_id,
                name,
                location,
                capacity,
                daily_rate,
                status,
                amenities,
                photos,
            } => {
                let mut resource = Resource::new(host_id, name, location, capacity, daily_rate);
                if let Some(id) = id {
                    resource.id = id;
                }
                resource.status = status;
                resource.amenities = amenities;
                resource.photos = photos;
                engine.create_resource(resource).map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::InsertReservation {
                guest_id,
                resource_id,
                start_date,
                end_date,
            } => {
                let guest_id = match guest_id {
                    Some(id) => id,
                    None => engine.first_guest().map(|g| g.id).ok_or_else(|| {
                        user_error("P0002", "no guest registered to book as".into())
                    })?,
                };
                let reservation = engine
                    .create_reservation(guest_id, resource_id, start_date, end_date)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![rows_response(
                    reservation_schema(),
                    [reservation],
                    encode_reservation,
                )])
            }
            Command::SelectUsers { id } => {
                let users = match id {
                    Some(id) => engine.get_user(&id).into_iter().collect(),
                    None => engine.list_users(),
                };
                Ok(vec![rows_response(user_schema(), users, encode_user)])
            }
            Command::SelectResources { id } => {
                let resources = match id {
                    Some(id) => engine.get_resource(&id).into_iter().collect(),
                    None => engine.list_resources(),
                };
                Ok(vec![rows_response(
                    resource_schema(),
                    resources,
                    encode_resource,
                )])
            }
            Command::SelectReservations { filter } => {
                let reservations = match filter {
                    ReservationFilter::All => engine.list_reservations(),
                    ReservationFilter::Id(id) => {
                        engine.get_reservation(&id).into_iter().collect()
                    }
                    ReservationFilter::Resource(rid) => {
                        engine.reservations_for_resource(&rid).await
                    }
                };
                Ok(vec![rows_response(
                    reservation_schema(),
                    reservations,
                    encode_reservation,
                )])
            }
            Command::SelectQuote {
                resource_id,
                start_date,
                end_date,
            } => {
                let quote = engine
                    .quote(resource_id, start_date, end_date)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![rows_response(quote_schema(), [quote], encode_quote)])
            }
        }
    }
}

// ── Result sets ───────────────────────────────────────────────

fn text_field(name: &str, ty: Type) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, ty, FieldFormat::Text)
}

fn user_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id", Type::VARCHAR),
        text_field("name", Type::VARCHAR),
        text_field("contact", Type::VARCHAR),
        text_field("role", Type::VARCHAR),
        text_field("identity_verified", Type::BOOL),
    ]
}

fn resource_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id", Type::VARCHAR),
        text_field("host_id", Type::VARCHAR),
        text_field("name", Type::VARCHAR),
        text_field("location", Type::VARCHAR),
        text_field("capacity", Type::INT8),
        text_field("daily_rate", Type::FLOAT8),
        text_field("amenities", Type::VARCHAR),
        text_field("photos", Type::VARCHAR),
        text_field("status", Type::VARCHAR),
    ]
}

fn reservation_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id", Type::VARCHAR),
        text_field("guest_id", Type::VARCHAR),
        text_field("resource_id", Type::VARCHAR),
        text_field("start_date", Type::DATE),
        text_field("end_date", Type::DATE),
        text_field("total_price", Type::FLOAT8),
        text_field("status", Type::VARCHAR),
    ]
}

fn quote_schema() -> Vec<FieldInfo> {
    vec![
        text_field("resource_id", Type::VARCHAR),
        text_field("start_date", Type::DATE),
        text_field("end_date", Type::DATE),
        text_field("days", Type::INT8),
        text_field("total_price", Type::FLOAT8),
    ]
}

fn rows_response<T>(
    schema: Vec<FieldInfo>,
    items: impl IntoIterator<Item = T>,
    encode: fn(&mut DataRowEncoder, &T) -> PgWireResult<()>,
) -> Response {
    let schema = Arc::new(schema);
    let rows: Vec<PgWireResult<DataRow>> = items
        .into_iter()
        .map(|item| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encode(&mut encoder, &item)?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

fn encode_user(encoder: &mut DataRowEncoder, user: &User) -> PgWireResult<()> {
    encoder.encode_field(&user.id.to_string())?;
    encoder.encode_field(&user.name)?;
    encoder.encode_field(&user.contact)?;
    encoder.encode_field(&user.role.to_string())?;
    encoder.encode_field(&user.identity_verified)?;
    Ok(())
}

fn encode_resource(encoder: &mut DataRowEncoder, resource: &Resource) -> PgWireResult<()> {
    encoder.encode_field(&resource.id.to_string())?;
    encoder.encode_field(&resource.host_id.to_string())?;
    encoder.encode_field(&resource.name)?;
    encoder.encode_field(&resource.location)?;
    encoder.encode_field(&i64::from(resource.capacity))?;
    encoder.encode_field(&resource.daily_rate)?;
    encoder.encode_field(&resource.amenities.join(", "))?;
    encoder.encode_field(&resource.photos.join(", "))?;
    encoder.encode_field(&resource.status.to_string())?;
    Ok(())
}

fn encode_reservation(encoder: &mut DataRowEncoder, r: &Reservation) -> PgWireResult<()> {
    encoder.encode_field(&r.id.to_string())?;
    encoder.encode_field(&r.guest_id.to_string())?;
    encoder.encode_field(&r.resource_id.to_string())?;
    encoder.encode_field(&r.start_date.to_string())?;
    encoder.encode_field(&r.end_date.to_string())?;
    encoder.encode_field(&r.total_price)?;
    encoder.encode_field(&r.status.to_string())?;
    Ok(())
}

fn encode_quote(encoder: &mut DataRowEncoder, q: &Quote) -> PgWireResult<()> {
    encoder.encode_field(&q.resource_id.to_string())?;
    encoder.encode_field(&q.start_date.to_string())?;
    encoder.encode_field(&q.end_date.to_string())?;
    encoder.encode_field(&q.days)?;
    encoder.encode_field(&q.total_price)?;
    Ok(())
}

/// Result columns for a statement, judged from its leading verb and target table.
fn result_schema(sql: &str) -> Vec<FieldInfo> {
    let lower = sql.to_lowercase();
    let mut words = lower
        .split(|c: char| c.is_whitespace() || c == '(' || c == ';')
        .filter(|w| !w.is_empty());
    let verb = words.next();
    let table = words.skip_while(|w| *w != "from" && *w != "into").nth(1);
    match (verb, table) {
        (Some("select"), Some("users")) => user_schema(),
        (Some("select"), Some("resources")) => resource_schema(),
        (Some("select"), Some("reservations")) | (Some("insert"), Some("reservations")) => {
            reservation_schema()
        }
        (Some("select"), Some("quotes")) => quote_schema(),
        _ => vec![],
    }
}

#[async_trait]
impl SimpleQueryHandler for CaravanHandler {
    async fn do_query<C>(&self, _client: &mut C, query: &str) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        self.execute_command(cmd).await
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct CaravanQueryParser;

#[async_trait]
impl QueryParser for CaravanQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(result_schema(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for CaravanHandler {
    type Statement = String;
    type QueryParser = CaravanQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        _client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let sql = substitute_params(portal);
        let cmd = sql::parse_sql(&sql).map_err(sql_err)?;
        let mut responses = self.execute_command(cmd).await?;
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
        Ok(DescribeStatementResponse::new(
            param_types,
            result_schema(&target.statement),
        ))
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
        Ok(DescribePortalResponse::new(result_schema(
            &target.statement.statement,
        )))
    }
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let bytes = sql.as_bytes();
    let mut max = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }
        i += 1;
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if let Ok(n) = sql[start..i].parse::<usize>() {
            max = max.max(n);
        }
    }
    max
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
fn substitute_params(portal: &Portal<String>) -> String {
    bind_text_params(&portal.statement.statement, &portal.parameters)
}

fn bind_text_params<P: AsRef<[u8]>>(sql: &str, params: &[Option<P>]) -> String {
    // Single left-to-right pass: bound text is emitted once and never rescanned.
    let bytes = sql.as_bytes();
    let mut result = String::with_capacity(sql.len());
    let mut copied = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }
        let digits = i + 1;
        let mut j = digits;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        let param = sql[digits..j]
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|idx| params.get(idx));
        if let Some(param) = param {
            result.push_str(&sql[copied..i]);
            match param {
                Some(value) => {
                    let text = String::from_utf8_lossy(value.as_ref());
                    result.push('\'');
                    result.push_str(&text.replace('\'', "''"));
                    result.push('\'');
                }
                None => result.push_str("NULL"),
            }
            copied = j;
        }
        i = j;
    }
    result.push_str(&sql[copied..]);
    result
}

// ── Factory ──────────────────────────────────────────────────────

pub struct CaravanFactory {
    handler: Arc<CaravanHandler>,
    noop: Arc<NoopHandler>,
}

impl CaravanFactory {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            handler: Arc::new(CaravanHandler::new(engine)),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for CaravanFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.noop.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection until it closes. No authentication.
pub async fn process_connection(socket: TcpStream, engine: Arc<Engine>) -> io::Result<()> {
    let factory = CaravanFactory::new(engine);
    pgwire::tokio::process_socket(socket, None, factory).await
}

// ── Errors ───────────────────────────────────────────────────────

fn sqlstate(e: &EngineError) -> &'static str {
    match e {
        EngineError::NotFound { .. } => "P0002",
        EngineError::DuplicateKey { .. } => "23505",
        EngineError::InvalidDate(_) => "22007",
        EngineError::ResourceUnavailable { .. } => "55000",
        EngineError::BookingConflict { .. } => "23P01",
        EngineError::InvalidReservation(_) | EngineError::InvalidResource(_) => "22023",
        EngineError::LimitExceeded(_) => "54000",
    }
}

fn user_error(code: &str, message: String) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        code.into(),
        message,
    )))
}

fn engine_err(e: EngineError) -> PgWireError {
    user_error(sqlstate(&e), e.to_string())
}

fn sql_err(e: SqlError) -> PgWireError {
    user_error("42601", e.to_string())
}
