//! In-memory stand-in for the loan backend.
//!
//! Implements the same routes, auth scheme (`Authorization: Token <key>`) and
//! JSON shapes as the production API so the client can be exercised end to
//! end. State lives in one `RwLock`ed `Backend` seeded with a borrower
//! (`jane@x.com` / `secret123`) and a staff account (`admin` / `admin123`).

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const PAGE_SIZE: usize = 10;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub nysc_state_code: Option<String>,
    pub monthly_allowance: f64,
    pub salary_account_verified: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoanProduct {
    pub id: u64,
    pub name: String,
    pub loan_type: String,
    pub min_amount: f64,
    pub max_amount: f64,
    pub interest_rate: f64,
    pub max_tenure_months: u32,
    pub processing_fee_percentage: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoanApplication {
    pub id: u64,
    pub application_id: String,
    pub applicant: u64,
    pub amount: f64,
    pub tenor: u32,
    pub purpose: String,
    pub status: String,
    pub loan_product: Option<u64>,
    pub approved_amount: Option<f64>,
    pub application_date: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Loan {
    pub id: u64,
    pub loan_id: String,
    pub borrower: u64,
    pub principal_amount: f64,
    pub outstanding_balance: f64,
    pub status: String,
    pub auto_deduction_active: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Repayment {
    pub id: u64,
    pub borrower: u64,
    pub amount: f64,
    pub due_date: String,
    pub status: String,
}

#[derive(Clone, Debug)]
struct User {
    id: u64,
    username: String,
    password: String,
    is_staff: bool,
    profile: Profile,
}

#[derive(Debug, Default)]
pub struct Backend {
    users: Vec<User>,
    tokens: HashMap<String, u64>,
    products: Vec<LoanProduct>,
    applications: Vec<LoanApplication>,
    loans: Vec<Loan>,
    repayments: Vec<Repayment>,
    next_id: u64,
}

impl Backend {
    pub fn seeded() -> Self {
        let mut backend = Backend {
            next_id: 100,
            ..Default::default()
        };
        backend.users.push(User {
            id: 1,
            username: "jane".to_string(),
            password: "secret123".to_string(),
            is_staff: false,
            profile: Profile {
                full_name: "Jane Doe".to_string(),
                email: "jane@x.com".to_string(),
                phone: Some("08011112222".to_string()),
                bank_name: Some("First Bank".to_string()),
                account_number: Some("0123456789".to_string()),
                nysc_state_code: Some("LA/24A/1234".to_string()),
                monthly_allowance: 33000.0,
                salary_account_verified: false,
            },
        });
        backend.users.push(User {
            id: 2,
            username: "admin".to_string(),
            password: "admin123".to_string(),
            is_staff: true,
            profile: Profile {
                full_name: "Loan Officer".to_string(),
                email: "admin@allawee.example".to_string(),
                phone: None,
                bank_name: None,
                account_number: None,
                nysc_state_code: None,
                monthly_allowance: 0.0,
                salary_account_verified: true,
            },
        });
        backend.products = vec![
            LoanProduct {
                id: 1,
                name: "Emergency Loan".to_string(),
                loan_type: "emergency".to_string(),
                min_amount: 10000.0,
                max_amount: 100000.0,
                interest_rate: 5.0,
                max_tenure_months: 6,
                processing_fee_percentage: 2.5,
            },
            LoanProduct {
                id: 2,
                name: "Business Loan".to_string(),
                loan_type: "business".to_string(),
                min_amount: 50000.0,
                max_amount: 500000.0,
                interest_rate: 8.0,
                max_tenure_months: 24,
                processing_fee_percentage: 2.5,
            },
        ];
        backend.loans.push(Loan {
            id: 1,
            loan_id: "LN0001".to_string(),
            borrower: 1,
            principal_amount: 250000.0,
            outstanding_balance: 180000.0,
            status: "active".to_string(),
            auto_deduction_active: false,
        });
        backend.repayments = vec![
            Repayment {
                id: 1,
                borrower: 1,
                amount: 15000.0,
                due_date: "2026-11-01".to_string(),
                status: "due".to_string(),
            },
            Repayment {
                id: 2,
                borrower: 1,
                amount: 15000.0,
                due_date: "2026-10-01".to_string(),
                status: "paid".to_string(),
            },
        ];
        backend
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn user(&self, id: u64) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn issue_token(&mut self, user_id: u64) -> String {
        if let Some((token, _)) = self.tokens.iter().find(|(_, id)| **id == user_id) {
            return token.clone();
        }
        let token = Uuid::new_v4().simple().to_string();
        self.tokens.insert(token.clone(), user_id);
        token
    }
}

pub type Db = Arc<RwLock<Backend>>;

/// A DRF-style error: `{"detail": ...}` with a status.
#[derive(Debug)]
pub struct Failure(StatusCode, String);

impl Failure {
    fn unauthorized() -> Self {
        Failure(
            StatusCode::UNAUTHORIZED,
            "Authentication credentials were not provided.".to_string(),
        )
    }

    fn forbidden() -> Self {
        Failure(
            StatusCode::FORBIDDEN,
            "You do not have permission to perform this action.".to_string(),
        )
    }

    fn not_found() -> Self {
        Failure(StatusCode::NOT_FOUND, "Not found.".to_string())
    }

    fn bad_request(msg: impl Into<String>) -> Self {
        Failure(StatusCode::BAD_REQUEST, msg.into())
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "detail": self.1 }))).into_response()
    }
}

type Reply<T> = Result<Json<T>, Failure>;

pub fn app() -> Router {
    app_with(Backend::seeded())
}

pub fn app_with(backend: Backend) -> Router {
    let db: Db = Arc::new(RwLock::new(backend));
    let api = Router::new()
        .route("/auth/login/", post(login))
        .route("/auth/register/", post(register))
        .route("/auth/logout/", post(logout))
        .route("/dashboard/", get(dashboard))
        .route("/dashboard/stats/", get(dashboard_stats))
        .route("/loan-products/", get(list_products))
        .route("/loan-products/{id}/", get(get_product))
        .route("/loans/", get(list_loans))
        .route("/loans/apply/", post(apply_for_loan))
        .route("/loan-applications/", get(list_applications))
        .route(
            "/loan-applications/{id}/",
            get(get_application).patch(update_application),
        )
        .route("/loan-applications/{id}/approve/", post(approve_application))
        .route("/loan-applications/{id}/reject/", post(reject_application))
        .route("/repayments/", get(repayment_dashboard))
        .route("/repayments/{id}/pay/", post(pay_installment))
        .route("/profile/", get(get_profile).patch(update_profile).put(update_profile))
        .route("/salary/verify/", post(verify_salary))
        .route("/salary/mandate/", post(setup_mandate))
        .with_state(db);
    Router::new().nest("/api", api)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn authenticate(headers: &HeaderMap, backend: &Backend) -> Result<u64, Failure> {
    let key = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Token "))
        .ok_or_else(Failure::unauthorized)?;
    backend
        .tokens
        .get(key.trim())
        .copied()
        .ok_or_else(|| Failure(StatusCode::UNAUTHORIZED, "Invalid token.".to_string()))
}

fn require_staff(headers: &HeaderMap, backend: &Backend) -> Result<u64, Failure> {
    let user_id = authenticate(headers, backend)?;
    match backend.user(user_id) {
        Some(user) if user.is_staff => Ok(user_id),
        _ => Err(Failure::forbidden()),
    }
}

// --- auth ---

#[derive(Deserialize)]
pub struct LoginInput {
    pub identifier: String,
    pub password: String,
}

async fn login(State(db): State<Db>, Json(input): Json<LoginInput>) -> Reply<serde_json::Value> {
    let mut backend = db.write().await;
    let user = backend
        .users
        .iter()
        .find(|u| {
            u.username == input.identifier
                || u.profile.email == input.identifier
                || u.profile.phone.as_deref() == Some(input.identifier.as_str())
        })
        .filter(|u| u.password == input.password)
        .cloned()
        .ok_or_else(|| Failure(StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()))?;
    let token = backend.issue_token(user.id);
    tracing::info!(user_id = user.id, "login");
    Ok(Json(json!({
        "token": token,
        "user_id": user.id,
        "username": user.username,
        "email": user.profile.email,
        "profile": user.profile,
    })))
}

#[derive(Deserialize)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub nysc_state_code: Option<String>,
    pub phone_number: Option<String>,
}

async fn register(
    State(db): State<Db>,
    Json(input): Json<RegisterInput>,
) -> Result<(StatusCode, Json<serde_json::Value>), Failure> {
    let mut backend = db.write().await;
    if input.password.len() < 8 {
        return Err(Failure::bad_request("Password must be at least 8 characters."));
    }
    if backend
        .users
        .iter()
        .any(|u| u.username == input.username || u.profile.email == input.email)
    {
        return Err(Failure::bad_request("A user with that username or email already exists."));
    }
    let id = backend.next_id();
    let profile = Profile {
        full_name: input.full_name,
        email: input.email,
        phone: input.phone_number,
        bank_name: None,
        account_number: None,
        nysc_state_code: input.nysc_state_code,
        monthly_allowance: 33000.0,
        salary_account_verified: false,
    };
    backend.users.push(User {
        id,
        username: input.username,
        password: input.password,
        is_staff: false,
        profile: profile.clone(),
    });
    let token = backend.issue_token(id);
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "token": token,
            "user_id": id,
            "profile": profile,
            "message": "Registration successful",
        })),
    ))
}

async fn logout(State(db): State<Db>, headers: HeaderMap) -> Reply<serde_json::Value> {
    let mut backend = db.write().await;
    let user_id = authenticate(&headers, &backend)?;
    backend.tokens.retain(|_, id| *id != user_id);
    Ok(Json(json!({ "message": "Successfully logged out" })))
}

// --- dashboards ---

async fn dashboard(State(db): State<Db>, headers: HeaderMap) -> Reply<serde_json::Value> {
    let backend = db.read().await;
    let user_id = authenticate(&headers, &backend)?;
    let applications: Vec<_> = backend
        .applications
        .iter()
        .filter(|a| a.applicant == user_id)
        .collect();
    let loans: Vec<_> = backend.loans.iter().filter(|l| l.borrower == user_id).collect();
    let repayments: Vec<_> = backend
        .repayments
        .iter()
        .filter(|r| r.borrower == user_id)
        .collect();
    let next_due = repayments
        .iter()
        .filter(|r| r.status != "paid")
        .min_by(|a, b| a.due_date.cmp(&b.due_date))
        .map(|r| json!({ "due_date": r.due_date, "amount": r.amount }));

    Ok(Json(json!({
        "total_applications": applications.len(),
        "pending_applications": applications.iter().filter(|a| a.status == "pending").count(),
        "approved_applications": applications.iter().filter(|a| a.status == "approved").count(),
        "active_loans": loans.iter().filter(|l| l.status == "active").count(),
        "total_borrowed": loans.iter().map(|l| l.principal_amount).sum::<f64>(),
        "total_paid": repayments.iter().filter(|r| r.status == "paid").map(|r| r.amount).sum::<f64>(),
        "outstanding_balance": loans
            .iter()
            .filter(|l| l.status == "active")
            .map(|l| l.outstanding_balance)
            .sum::<f64>(),
        "next_payment_due": next_due,
    })))
}

async fn dashboard_stats(State(db): State<Db>, headers: HeaderMap) -> Reply<serde_json::Value> {
    let backend = db.read().await;
    require_staff(&headers, &backend)?;
    let total_loans = backend.loans.len();
    let defaulted = backend.loans.iter().filter(|l| l.status == "defaulted").count();
    let default_rate = if total_loans > 0 {
        (defaulted as f64 / total_loans as f64 * 10000.0).round() / 100.0
    } else {
        0.0
    };
    Ok(Json(json!({
        "total_users": backend.users.len(),
        "total_applications": backend.applications.len(),
        "total_active_loans": backend.loans.iter().filter(|l| l.status == "active").count(),
        "total_loan_amount": backend.loans.iter().map(|l| l.principal_amount).sum::<f64>(),
        "total_collections": backend
            .repayments
            .iter()
            .filter(|r| r.status == "paid")
            .map(|r| r.amount)
            .sum::<f64>(),
        "pending_applications": backend.applications.iter().filter(|a| a.status == "pending").count(),
        "overdue_payments": backend.repayments.iter().filter(|r| r.status == "overdue").count(),
        "default_rate": default_rate,
    })))
}

// --- loans ---

async fn list_products(State(db): State<Db>) -> Json<Vec<LoanProduct>> {
    Json(db.read().await.products.clone())
}

async fn get_product(State(db): State<Db>, Path(id): Path<u64>) -> Reply<LoanProduct> {
    let backend = db.read().await;
    backend
        .products
        .iter()
        .find(|p| p.id == id)
        .cloned()
        .map(Json)
        .ok_or_else(Failure::not_found)
}

async fn list_loans(State(db): State<Db>, headers: HeaderMap) -> Reply<Vec<Loan>> {
    let backend = db.read().await;
    let user_id = authenticate(&headers, &backend)?;
    let is_staff = backend.user(user_id).is_some_and(|u| u.is_staff);
    Ok(Json(
        backend
            .loans
            .iter()
            .filter(|l| is_staff || l.borrower == user_id)
            .cloned()
            .collect(),
    ))
}

#[derive(Deserialize)]
pub struct ApplyInput {
    pub amount: f64,
    pub tenor: u32,
    pub purpose: String,
    pub loan_product: Option<u64>,
}

async fn apply_for_loan(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<ApplyInput>,
) -> Result<(StatusCode, Json<LoanApplication>), Failure> {
    let mut backend = db.write().await;
    let user_id = authenticate(&headers, &backend)?;
    if input.amount <= 0.0 {
        return Err(Failure::bad_request("Amount must be positive."));
    }
    if !(1..=24).contains(&input.tenor) {
        return Err(Failure::bad_request("Tenor must be between 1 and 24 months."));
    }
    if let Some(product_id) = input.loan_product {
        let product = backend
            .products
            .iter()
            .find(|p| p.id == product_id)
            .ok_or_else(|| Failure::bad_request("Unknown loan product."))?;
        if input.amount < product.min_amount || input.amount > product.max_amount {
            return Err(Failure::bad_request("Amount is outside the product's limits."));
        }
    }
    let id = backend.next_id();
    let application = LoanApplication {
        id,
        application_id: format!("APP{id:06}"),
        applicant: user_id,
        amount: input.amount,
        tenor: input.tenor,
        purpose: input.purpose,
        status: "pending".to_string(),
        loan_product: input.loan_product,
        approved_amount: None,
        application_date: "2026-10-16T09:00:00Z".to_string(),
    };
    backend.applications.push(application.clone());
    Ok((StatusCode::CREATED, Json(application)))
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
}

async fn list_applications(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Reply<serde_json::Value> {
    let backend = db.read().await;
    let user_id = authenticate(&headers, &backend)?;
    let is_staff = backend.user(user_id).is_some_and(|u| u.is_staff);
    let visible: Vec<_> = backend
        .applications
        .iter()
        .rev()
        .filter(|a| is_staff || a.applicant == user_id)
        .cloned()
        .collect();
    let page = query.page.unwrap_or(1).max(1);
    let start = (page - 1) * PAGE_SIZE;
    if start > 0 && start >= visible.len() {
        return Err(Failure(StatusCode::NOT_FOUND, "Invalid page.".to_string()));
    }
    let results: Vec<_> = visible.iter().skip(start).take(PAGE_SIZE).collect();
    let next = (start + PAGE_SIZE < visible.len())
        .then(|| format!("/api/loan-applications/?page={}", page + 1));
    let previous = (page > 1).then(|| format!("/api/loan-applications/?page={}", page - 1));
    Ok(Json(json!({
        "count": visible.len(),
        "next": next,
        "previous": previous,
        "results": results,
    })))
}

fn visible_application<'a>(
    backend: &'a mut Backend,
    headers: &HeaderMap,
    id: u64,
    staff_only: bool,
) -> Result<&'a mut LoanApplication, Failure> {
    let user_id = authenticate(headers, backend)?;
    let is_staff = backend.user(user_id).is_some_and(|u| u.is_staff);
    if staff_only && !is_staff {
        return Err(Failure::forbidden());
    }
    backend
        .applications
        .iter_mut()
        .find(|a| a.id == id && (is_staff || a.applicant == user_id))
        .ok_or_else(Failure::not_found)
}

async fn get_application(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Reply<LoanApplication> {
    let mut backend = db.write().await;
    visible_application(&mut backend, &headers, id, false).map(|a| Json(a.clone()))
}

#[derive(Deserialize)]
pub struct ApplicationPatch {
    pub approved_amount: Option<f64>,
    pub status: Option<String>,
}

async fn update_application(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(input): Json<ApplicationPatch>,
) -> Reply<LoanApplication> {
    let mut backend = db.write().await;
    let application = visible_application(&mut backend, &headers, id, true)?;
    if let Some(amount) = input.approved_amount {
        application.approved_amount = Some(amount);
    }
    if let Some(status) = input.status {
        application.status = status;
    }
    Ok(Json(application.clone()))
}

async fn approve_application(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Reply<LoanApplication> {
    let mut backend = db.write().await;
    let application = visible_application(&mut backend, &headers, id, true)?;
    if application.status != "pending" && application.status != "under_review" {
        return Err(Failure::bad_request("Application has already been decided."));
    }
    application.status = "approved".to_string();
    application.approved_amount = Some(application.amount);
    let approved = application.clone();

    let loan_id = backend.next_id();
    backend.loans.push(Loan {
        id: loan_id,
        loan_id: format!("LN{loan_id:04}"),
        borrower: approved.applicant,
        principal_amount: approved.amount,
        outstanding_balance: approved.amount,
        status: "active".to_string(),
        auto_deduction_active: false,
    });
    Ok(Json(approved))
}

async fn reject_application(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Reply<LoanApplication> {
    let mut backend = db.write().await;
    let application = visible_application(&mut backend, &headers, id, true)?;
    if application.status != "pending" && application.status != "under_review" {
        return Err(Failure::bad_request("Application has already been decided."));
    }
    application.status = "rejected".to_string();
    Ok(Json(application.clone()))
}

// --- repayments ---

async fn repayment_dashboard(State(db): State<Db>, headers: HeaderMap) -> Reply<serde_json::Value> {
    let backend = db.read().await;
    let user_id = authenticate(&headers, &backend)?;
    let mine: Vec<&Repayment> = backend
        .repayments
        .iter()
        .filter(|r| r.borrower == user_id)
        .collect();
    let outstanding: f64 = mine.iter().filter(|r| r.status != "paid").map(|r| r.amount).sum();
    let total_paid: f64 = mine.iter().filter(|r| r.status == "paid").map(|r| r.amount).sum();
    let next_due_date = mine
        .iter()
        .filter(|r| r.status != "paid")
        .map(|r| r.due_date.clone())
        .min();
    let repayments: Vec<_> = mine
        .iter()
        .map(|r| json!({ "id": r.id, "amount": r.amount, "due_date": r.due_date, "status": r.status }))
        .collect();
    Ok(Json(json!({
        "summary": {
            "outstanding": outstanding,
            "next_due_date": next_due_date,
            "total_paid": total_paid,
            "installments": repayments.len(),
        },
        "repayments": repayments,
    })))
}

async fn pay_installment(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Reply<serde_json::Value> {
    let mut backend = db.write().await;
    let user_id = authenticate(&headers, &backend)?;
    let repayment = backend
        .repayments
        .iter_mut()
        .find(|r| r.id == id && r.borrower == user_id)
        .ok_or_else(Failure::not_found)?;
    if repayment.status == "paid" {
        return Err(Failure::bad_request("Installment already paid."));
    }
    repayment.status = "paid".to_string();
    let paid = repayment.clone();
    if let Some(loan) = backend
        .loans
        .iter_mut()
        .find(|l| l.borrower == user_id && l.status == "active")
    {
        loan.outstanding_balance = (loan.outstanding_balance - paid.amount).max(0.0);
    }
    Ok(Json(json!({
        "id": paid.id,
        "amount": paid.amount,
        "due_date": paid.due_date,
        "status": paid.status,
    })))
}

// --- profile & salary ---

async fn get_profile(State(db): State<Db>, headers: HeaderMap) -> Reply<Profile> {
    let backend = db.read().await;
    let user_id = authenticate(&headers, &backend)?;
    backend
        .user(user_id)
        .map(|u| Json(u.profile.clone()))
        .ok_or_else(Failure::not_found)
}

#[derive(Deserialize)]
pub struct ProfilePatch {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
}

async fn update_profile(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<ProfilePatch>,
) -> Reply<Profile> {
    let mut backend = db.write().await;
    let user_id = authenticate(&headers, &backend)?;
    let user = backend
        .users
        .iter_mut()
        .find(|u| u.id == user_id)
        .ok_or_else(Failure::not_found)?;
    let profile = &mut user.profile;
    if let Some(v) = input.full_name {
        profile.full_name = v;
    }
    if let Some(v) = input.email {
        profile.email = v;
    }
    if let Some(v) = input.phone {
        profile.phone = Some(v);
    }
    if let Some(v) = input.bank_name {
        profile.bank_name = Some(v);
    }
    if let Some(v) = input.account_number {
        if v.len() != 10 || !v.chars().all(|c| c.is_ascii_digit()) {
            return Err(Failure::bad_request("Account number must be 10 digits."));
        }
        profile.account_number = Some(v);
    }
    Ok(Json(profile.clone()))
}

async fn verify_salary(State(db): State<Db>, headers: HeaderMap) -> Reply<serde_json::Value> {
    let mut backend = db.write().await;
    let user_id = authenticate(&headers, &backend)?;
    let user = backend
        .users
        .iter_mut()
        .find(|u| u.id == user_id)
        .ok_or_else(Failure::not_found)?;
    user.profile.salary_account_verified = true;
    Ok(Json(json!({
        "status": "success",
        "salary_verified": true,
        "monthly_salary": user.profile.monthly_allowance,
        "employer": "NYSC",
        "verification_date": "2026-10-16T09:00:00Z",
    })))
}

#[derive(Deserialize)]
pub struct MandateInput {
    pub loan_id: u64,
}

async fn setup_mandate(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<MandateInput>,
) -> Reply<serde_json::Value> {
    let mut backend = db.write().await;
    let user_id = authenticate(&headers, &backend)?;
    let loan = backend
        .loans
        .iter_mut()
        .find(|l| l.id == input.loan_id && l.borrower == user_id)
        .ok_or_else(|| Failure(StatusCode::NOT_FOUND, "Loan not found".to_string()))?;
    let mandate_id = format!("MND{}", loan.loan_id);
    loan.auto_deduction_active = true;
    Ok(Json(json!({
        "status": "success",
        "mandate_id": mandate_id,
        "message": "Mandate setup successful",
    })))
}
