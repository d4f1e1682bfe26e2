use actix_web::{web, HttpResponse};

use crate::auth::AuthUser;
use crate::core::error::BlogError;
use crate::models::user::{PublicUser, RoleRequest};
use crate::web::models::{DataResponse, GenericResponse, ListResponse, UserListQuery};
use crate::web::server::AppState;

/// List users (admin only)
pub async fn list_users(
    data: web::Data<AppState>,
    user: AuthUser,
    query: web::Query<UserListQuery>,
) -> Result<HttpResponse, BlogError> {
    user.require_admin()?;
    let query = query.into_inner();
    let page = data.page_request(query.page, query.limit);

    let users = data.users.list(page, query.search.as_deref(), query.role).await?;
    Ok(HttpResponse::Ok().json(ListResponse::from(users)))
}

/// A user's profile; admins see anyone, others only themselves
pub async fn get_user(
    data: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, BlogError> {
    let id = path.into_inner();
    if !user.can_manage(&id) {
        return Err(BlogError::Forbidden("Admin privileges required".to_string()));
    }

    let profile = data.users.get(&id).await?;
    Ok(HttpResponse::Ok().json(DataResponse::new(PublicUser::from(&profile))))
}

pub async fn set_role(
    data: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
    body: web::Json<RoleRequest>,
) -> Result<HttpResponse, BlogError> {
    let updated = data.users.set_role(&user, &path.into_inner(), body.role).await?;
    Ok(HttpResponse::Ok().json(DataResponse::new(PublicUser::from(&updated))))
}

pub async fn delete_user(
    data: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, BlogError> {
    data.users.delete(&user, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(GenericResponse::message("User deleted")))
}
