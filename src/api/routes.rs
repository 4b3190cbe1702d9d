//! HTTP API route definitions

use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};

use super::auth;
use super::handlers::{self, activity, finance, projects, reports, tasks, users};
use super::AppState;

/// Create the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    // Public: login, health and the secret-guarded cron triggers
    let auth_routes = Router::new()
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/health", get(handlers::health))
        .route("/api/cron/run-scheduled", post(reports::run_scheduled))
        .route("/api/cron/{report}", post(reports::cron_report));

    // Protected routes with auth middleware
    let protected_routes = Router::new()
        // Users
        .route("/api/users", get(users::list_users).post(users::create_user))
        .route(
            "/api/users/{id}",
            get(users::get_user).put(users::update_user).delete(users::delete_user),
        )
        .route("/api/users/{id}/password", put(users::change_password))
        // Finance
        .route(
            "/api/categories",
            get(finance::list_categories).post(finance::create_category),
        )
        .route(
            "/api/categories/{id}",
            get(finance::get_category)
                .put(finance::update_category)
                .delete(finance::delete_category),
        )
        .route(
            "/api/transactions",
            get(finance::list_transactions).post(finance::create_transaction),
        )
        .route(
            "/api/transactions/{id}",
            get(finance::get_transaction)
                .put(finance::update_transaction)
                .delete(finance::delete_transaction),
        )
        .route("/api/invoices", get(finance::list_invoices).post(finance::create_invoice))
        .route(
            "/api/invoices/{id}",
            get(finance::get_invoice)
                .put(finance::update_invoice)
                .delete(finance::delete_invoice),
        )
        // Projects (static routes before dynamic {id} routes)
        .route("/api/projects", get(projects::list_projects).post(projects::create_project))
        .route(
            "/api/projects/{id}",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_project),
        )
        .route(
            "/api/projects/{id}/members",
            get(projects::list_members).post(projects::add_member),
        )
        .route(
            "/api/projects/{id}/members/{member_id}",
            put(projects::update_member).delete(projects::remove_member),
        )
        .route("/api/projects/{id}/tasks", get(projects::project_tasks))
        // Tasks
        .route("/api/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route("/api/tasks/reorder", patch(tasks::reorder_task))
        .route(
            "/api/tasks/{id}",
            get(tasks::get_task).put(tasks::update_task).delete(tasks::delete_task),
        )
        .route(
            "/api/tasks/{id}/comments",
            get(tasks::list_comments).post(tasks::add_comment),
        )
        .route("/api/labels", get(tasks::list_labels))
        // Activity and dashboard
        .route("/api/activity-log", get(activity::list_activity))
        .route("/api/dashboard/stats", get(activity::dashboard_stats))
        // Reports
        .route("/api/reports", get(reports::list_schedules).post(reports::create_schedule))
        .route("/api/reports/scheduler", get(reports::scheduler_status))
        .route("/api/reports/run/{frequency}", post(reports::run_report))
        .route(
            "/api/reports/{id}",
            get(reports::get_schedule)
                .put(reports::update_schedule)
                .patch(reports::update_schedule)
                .delete(reports::delete_schedule),
        );

    Router::new()
        .merge(auth_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_middleware))
        .with_state(state)
}
