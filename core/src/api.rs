//! One method per backend operation.
//!
//! Reads of slow-changing resources go through the response cache; every
//! mutation invalidates the entries it can make stale once it succeeds.

use tracing::{info, warn};

use crate::cache::{keys, ttl};
use crate::client::ApiClient;
use crate::codec::RequestOptions;
use crate::error::Result;
use crate::types::{
    Dashboard, DashboardStats, Loan, LoanApplication, LoanApplicationRequest,
    LoanApplicationUpdate, LoanProduct, LoginRequest, LoginResponse, MandateRequest,
    MandateResponse, Page, Profile, ProfileUpdate, RegisterRequest, RegisterResponse, Repayment,
    RepaymentDashboard, SalaryVerification,
};

impl ApiClient {
    // -----------------------------------------------------------------------
    // Auth
    // -----------------------------------------------------------------------

    /// Authenticate and persist the returned token before returning.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<LoginResponse> {
        let body = LoginRequest {
            identifier: identifier.to_string(),
            password: password.to_string(),
        };
        let response: LoginResponse = self
            .request_json("/auth/login/", RequestOptions::post().json(&body)?)
            .await?;
        self.start_session(&response.token).await?;
        info!(user_id = ?response.user_id, "logged in");
        Ok(response)
    }

    /// Create an account; the new session is stored like a login.
    pub async fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse> {
        let response: RegisterResponse = self
            .request_json("/auth/register/", RequestOptions::post().json(request)?)
            .await?;
        self.start_session(&response.token).await?;
        info!(user_id = response.user_id, "registered");
        Ok(response)
    }

    /// End the session. The local token is cleared whatever the server or
    /// the token store's read path says; only a failure to clear local state
    /// is returned.
    pub async fn logout(&self) -> Result<()> {
        match self.token_store().get().await {
            Ok(Some(_)) => {
                if let Err(e) = self.request("/auth/logout/", RequestOptions::post()).await {
                    warn!(error = %e, "server logout failed, clearing local session anyway");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "could not read session token, clearing it"),
        }
        self.token_store().clear().await?;
        self.cache().clear();
        info!("logged out");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Dashboards
    // -----------------------------------------------------------------------

    pub async fn get_dashboard(&self) -> Result<Dashboard> {
        self.cache()
            .fetch_through(keys::DASHBOARD, ttl::DASHBOARD, || {
                self.request_json("/dashboard/", RequestOptions::get())
            })
            .await
    }

    pub async fn get_dashboard_stats(&self) -> Result<DashboardStats> {
        self.cache()
            .fetch_through(keys::DASHBOARD_STATS, ttl::DASHBOARD, || {
                self.request_json("/dashboard/stats/", RequestOptions::get())
            })
            .await
    }

    // -----------------------------------------------------------------------
    // Loans
    // -----------------------------------------------------------------------

    pub async fn list_loan_products(&self) -> Result<Vec<LoanProduct>> {
        self.cache()
            .fetch_through(keys::LOAN_PRODUCTS, ttl::LOAN_PRODUCTS, || {
                self.request_json("/loan-products/", RequestOptions::get())
            })
            .await
    }

    pub async fn get_loan_product(&self, id: u64) -> Result<LoanProduct> {
        let path = format!("/loan-products/{id}/");
        self.cache()
            .fetch_through(&keys::loan_product(id), ttl::LOAN_PRODUCTS, || {
                self.request_json(&path, RequestOptions::get())
            })
            .await
    }

    pub async fn apply_for_loan(&self, request: &LoanApplicationRequest) -> Result<LoanApplication> {
        let application: LoanApplication = self
            .request_json("/loans/apply/", RequestOptions::post().json(request)?)
            .await?;
        self.invalidate_loan_views();
        info!(application = application.id, "loan application submitted");
        Ok(application)
    }

    pub async fn list_loans(&self) -> Result<Vec<Loan>> {
        self.cache()
            .fetch_through(keys::LOANS, ttl::LOANS, || {
                self.request_json("/loans/", RequestOptions::get())
            })
            .await
    }

    /// Paginated application listing. Pages start at 1.
    pub async fn list_loan_applications(&self, page: u32) -> Result<Page<LoanApplication>> {
        let page = page.max(1);
        let path = format!("/loan-applications/?page={page}");
        self.cache()
            .fetch_through(
                &keys::loan_applications_page(page),
                ttl::LOAN_APPLICATIONS,
                || self.request_json(&path, RequestOptions::get()),
            )
            .await
    }

    pub async fn get_loan_application(&self, id: u64) -> Result<LoanApplication> {
        let path = format!("/loan-applications/{id}/");
        self.cache()
            .fetch_through(
                &keys::loan_application(id),
                ttl::LOAN_APPLICATIONS,
                || self.request_json(&path, RequestOptions::get()),
            )
            .await
    }

    pub async fn update_loan_application(
        &self,
        id: u64,
        update: &LoanApplicationUpdate,
    ) -> Result<LoanApplication> {
        let path = format!("/loan-applications/{id}/");
        let application = self
            .request_json(&path, RequestOptions::patch().json(update)?)
            .await?;
        self.invalidate_loan_views();
        Ok(application)
    }

    pub async fn approve_loan_application(&self, id: u64) -> Result<LoanApplication> {
        let path = format!("/loan-applications/{id}/approve/");
        let application = self.request_json(&path, RequestOptions::post()).await?;
        self.invalidate_loan_views();
        info!(application = id, "loan application approved");
        Ok(application)
    }

    pub async fn reject_loan_application(&self, id: u64) -> Result<LoanApplication> {
        let path = format!("/loan-applications/{id}/reject/");
        let application = self.request_json(&path, RequestOptions::post()).await?;
        self.invalidate_loan_views();
        info!(application = id, "loan application rejected");
        Ok(application)
    }

    // -----------------------------------------------------------------------
    // Repayments
    // -----------------------------------------------------------------------

    pub async fn get_repayment_dashboard(&self) -> Result<RepaymentDashboard> {
        self.cache()
            .fetch_through(keys::REPAYMENTS, ttl::REPAYMENTS, || {
                self.request_json("/repayments/", RequestOptions::get())
            })
            .await
    }

    pub async fn pay_installment(&self, repayment_id: u64) -> Result<Repayment> {
        let path = format!("/repayments/{repayment_id}/pay/");
        let repayment = self.request_json(&path, RequestOptions::post()).await?;
        self.cache().invalidate_prefix(keys::REPAYMENTS);
        self.cache().invalidate_prefix(keys::DASHBOARD);
        info!(repayment = repayment_id, "installment paid");
        Ok(repayment)
    }

    // -----------------------------------------------------------------------
    // Profile & salary
    // -----------------------------------------------------------------------

    pub async fn get_profile(&self) -> Result<Profile> {
        self.cache()
            .fetch_through(keys::PROFILE, ttl::PROFILE, || {
                self.request_json("/profile/", RequestOptions::get())
            })
            .await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile> {
        let profile = self
            .request_json("/profile/", RequestOptions::patch().json(update)?)
            .await?;
        self.cache().invalidate_prefix(keys::PROFILE);
        Ok(profile)
    }

    /// Safe to call repeatedly; never cached.
    pub async fn verify_salary(&self) -> Result<SalaryVerification> {
        let verification = self
            .request_json("/salary/verify/", RequestOptions::post())
            .await?;
        self.cache().invalidate_prefix(keys::PROFILE);
        Ok(verification)
    }

    /// Set up automatic salary deductions for `loan_id`.
    pub async fn setup_mandate(&self, loan_id: u64) -> Result<MandateResponse> {
        let body = MandateRequest { loan_id };
        let mandate = self
            .request_json("/salary/mandate/", RequestOptions::post().json(&body)?)
            .await?;
        self.cache().invalidate_prefix(keys::LOANS);
        Ok(mandate)
    }

    fn invalidate_loan_views(&self) {
        let cache = self.cache();
        cache.invalidate_prefix(keys::DASHBOARD);
        cache.invalidate_prefix(keys::LOANS);
        cache.invalidate_prefix(keys::LOAN_APPLICATIONS);
    }
}
