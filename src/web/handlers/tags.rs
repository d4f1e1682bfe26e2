use actix_web::{web, HttpResponse};

use crate::auth::AuthUser;
use crate::core::error::BlogError;
use crate::models::tag::TagRequest;
use crate::web::models::{DataResponse, GenericResponse};
use crate::web::server::AppState;

pub async fn list_tags(data: web::Data<AppState>) -> Result<HttpResponse, BlogError> {
    let tags = data.tags.list().await?;
    Ok(HttpResponse::Ok().json(DataResponse::new(tags)))
}

pub async fn get_tag(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, BlogError> {
    let tag = data.tags.get_by_slug(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(DataResponse::new(tag)))
}

pub async fn create_tag(
    data: web::Data<AppState>,
    user: AuthUser,
    body: web::Json<TagRequest>,
) -> Result<HttpResponse, BlogError> {
    user.require_admin()?;
    let tag = data.tags.create(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(DataResponse::new(tag)))
}

pub async fn update_tag(
    data: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
    body: web::Json<TagRequest>,
) -> Result<HttpResponse, BlogError> {
    user.require_admin()?;
    let tag = data.tags.update(&path.into_inner(), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(DataResponse::new(tag)))
}

/// Delete a tag; articles carrying it simply lose it
pub async fn delete_tag(
    data: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, BlogError> {
    user.require_admin()?;
    data.tags.delete(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(GenericResponse::message("Tag deleted")))
}
