use super::models::BasicAuthUsers;
use actix_web::http::header::{self, Header};
use actix_web::{
    Error, HttpResponse,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use actix_web_httpauth::headers::authorization::{Authorization, Basic};
use futures::future::{Ready, ok};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub const REALM: &str = "mildew";

/// Rejects every request that does not carry valid Basic credentials.
#[derive(Clone)]
pub struct BasicAuthMiddleware {
    users: Arc<BasicAuthUsers>,
}

impl BasicAuthMiddleware {
    pub fn new(users: BasicAuthUsers) -> Self {
        Self {
            users: Arc::new(users),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for BasicAuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<actix_web::body::EitherBody<B>>;
    type Error = Error;
    type Transform = BasicAuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(BasicAuthMiddlewareService {
            service: Arc::new(service),
            users: self.users.clone(),
        })
    }
}

pub struct BasicAuthMiddlewareService<S> {
    service: Arc<S>,
    users: Arc<BasicAuthUsers>,
}

#[derive(Debug)]
enum AuthError {
    MissingOrMalformed,
    UnknownCredentials(String),
}

impl AuthError {
    fn log_message(&self, path: &str) -> String {
        match self {
            AuthError::MissingOrMalformed => {
                format!("Missing or malformed Basic credentials for path: {}", path)
            }
            AuthError::UnknownCredentials(user) => {
                format!("Rejected credentials of user {:?} for path: {}", user, path)
            }
        }
    }
}

fn validate_request(req: &ServiceRequest, users: &BasicAuthUsers) -> Result<(), AuthError> {
    let authorization =
        Authorization::<Basic>::parse(req).map_err(|_| AuthError::MissingOrMalformed)?;
    let basic = authorization.as_ref();
    if users.verify(basic.user_id(), basic.password()) {
        Ok(())
    } else {
        Err(AuthError::UnknownCredentials(basic.user_id().to_string()))
    }
}

impl<S, B> Service<ServiceRequest> for BasicAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<actix_web::body::EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let users = self.users.clone();

        Box::pin(async move {
            match validate_request(&req, &users) {
                Ok(()) => {
                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                }
                Err(auth_error) => {
                    log::warn!("{}", auth_error.log_message(req.path()));

                    let (http_req, _payload) = req.into_parts();
                    let response = HttpResponse::Unauthorized()
                        .insert_header((
                            header::WWW_AUTHENTICATE,
                            format!("Basic realm=\"{}\"", REALM),
                        ))
                        .finish()
                        .map_into_right_body();
                    Ok(ServiceResponse::new(http_req, response))
                }
            }
        })
    }
}
