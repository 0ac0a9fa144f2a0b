//! Request and response schemas for the loan API.
//!
//! # Design
//! Every endpoint gets an explicit serde type. Required fields have no
//! defaults, so a response missing them fails to decode instead of reaching
//! the caller with fabricated zeros. Monetary amounts are plain JSON numbers.
//! Timestamps stay as the ISO-8601 strings the server sends; formatting them
//! is a presentation concern.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Username, email address or phone number, plus password.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nysc_state_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegisterResponse {
    pub token: String,
    pub user_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ---------------------------------------------------------------------------
// Dashboards
// ---------------------------------------------------------------------------

/// Per-user aggregate counters shown on the home screen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dashboard {
    pub total_applications: u32,
    pub pending_applications: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_applications: Option<u32>,
    pub active_loans: u32,
    pub total_borrowed: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_paid: Option<f64>,
    pub outstanding_balance: f64,
    #[serde(default)]
    pub next_payment_due: Option<PaymentDue>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentDue {
    pub due_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

/// Portfolio-wide statistics for the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardStats {
    pub total_users: u32,
    pub total_applications: u32,
    pub total_active_loans: u32,
    pub total_loan_amount: f64,
    pub total_collections: f64,
    pub pending_applications: u32,
    pub overdue_payments: u32,
    pub default_rate: f64,
}

// ---------------------------------------------------------------------------
// Loans
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoanProduct {
    pub id: u64,
    pub name: String,
    pub loan_type: String,
    pub min_amount: f64,
    pub max_amount: f64,
    pub interest_rate: f64,
    pub max_tenure_months: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_fee_percentage: Option<f64>,
}

/// Body of a loan application. `tenor` is in months.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoanApplicationRequest {
    pub amount: f64,
    pub tenor: u32,
    pub purpose: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loan_product: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    UnderReview,
    Approved,
    Rejected,
    Disbursed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoanApplication {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    pub amount: f64,
    pub tenor: u32,
    pub purpose: String,
    pub status: ApplicationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loan_product: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_date: Option<String>,
}

/// Officer-side edits to an application. Omitted fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LoanApplicationUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ApplicationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_notes: Option<String>,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Loan {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loan_id: Option<String>,
    pub principal_amount: f64,
    pub outstanding_balance: f64,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_deduction_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MandateRequest {
    pub loan_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MandateResponse {
    pub status: String,
    pub mandate_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ---------------------------------------------------------------------------
// Repayments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RepaymentStatus {
    Due,
    Paid,
    Overdue,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Repayment {
    pub id: u64,
    pub amount: f64,
    pub due_date: String,
    pub status: RepaymentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepaymentSummary {
    pub outstanding: f64,
    pub next_due_date: Option<String>,
    pub total_paid: f64,
    pub installments: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepaymentDashboard {
    pub summary: RepaymentSummary,
    pub repayments: Vec<Repayment>,
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub full_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nysc_state_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_allowance: Option<f64>,
    #[serde(default)]
    pub salary_account_verified: bool,
}

/// Partial profile update. Only fields that are `Some` are sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
}

// ---------------------------------------------------------------------------
// Salary verification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SalaryVerification {
    pub status: String,
    pub salary_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_salary: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_date: Option<String>,
}
