use crate::naming_service::NamingService;
use dfs_lib::{
    BooleanReturn, DfsError, DfsResult, ExceptionReturn, FilesReturn, LockRequest, PathRequest,
    PublisherRegisterRequest, RegisterRequest, ReplicationRequest, SubscriberRegisterRequest,
};
use log::info;
use serde::Serialize;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

/// The naming server's two HTTP surfaces: the client-facing service port
/// and the storage-facing registration port. Everything is a JSON POST.

fn with_service(
    svc: Arc<NamingService>,
) -> impl Filter<Extract = (Arc<NamingService>,), Error = Infallible> + Clone {
    warp::any().map(move || svc.clone())
}

fn reply_json<T: Serialize>(status: StatusCode, value: &T) -> warp::reply::Response {
    warp::reply::with_status(warp::reply::json(value), status).into_response()
}

fn reply_error(e: &DfsError) -> warp::reply::Response {
    let status = StatusCode::from_u16(e.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    reply_json(status, &ExceptionReturn::from(e))
}

fn reply_result<T: Serialize>(result: DfsResult<T>) -> Result<warp::reply::Response, Rejection> {
    Ok(match result {
        Ok(value) => reply_json(StatusCode::OK, &value),
        Err(e) => reply_error(&e),
    })
}

/// Success with an empty body, the shape lock/unlock answer with.
fn reply_empty(result: DfsResult<()>) -> Result<warp::reply::Response, Rejection> {
    Ok(match result {
        Ok(()) => warp::reply::with_status(String::new(), StatusCode::OK).into_response(),
        Err(e) => reply_error(&e),
    })
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let e = if err.find::<warp::filters::body::BodyDeserializeError>().is_some() {
        DfsError::BadRequest("malformed request body".to_string())
    } else if err.is_not_found() {
        DfsError::NotFound("no such endpoint".to_string())
    } else {
        DfsError::Internal(format!("unhandled rejection: {:?}", err))
    };
    Ok(reply_error(&e))
}

pub fn service_routes(
    svc: Arc<NamingService>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let is_valid_path = warp::path!("is_valid_path")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(svc.clone()))
        .and_then(|req: PathRequest, svc: Arc<NamingService>| async move {
            reply_result(Ok(BooleanReturn {
                success: svc.is_valid_path(&req.path),
            }))
        });

    let is_directory = warp::path!("is_directory")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(svc.clone()))
        .and_then(|req: PathRequest, svc: Arc<NamingService>| async move {
            reply_result(
                svc.is_directory(&req.path)
                    .await
                    .map(|success| BooleanReturn { success }),
            )
        });

    let list = warp::path!("list")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(svc.clone()))
        .and_then(|req: PathRequest, svc: Arc<NamingService>| async move {
            reply_result(svc.list(&req.path).await.map(|files| FilesReturn { files }))
        });

    let create_directory = warp::path!("create_directory")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(svc.clone()))
        .and_then(|req: PathRequest, svc: Arc<NamingService>| async move {
            reply_result(
                svc.create_directory(&req.path)
                    .await
                    .map(|success| BooleanReturn { success }),
            )
        });

    let create_file = warp::path!("create_file")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(svc.clone()))
        .and_then(|req: PathRequest, svc: Arc<NamingService>| async move {
            reply_result(
                svc.create_file(&req.path, req.publisher_id.as_deref())
                    .await
                    .map(|success| BooleanReturn { success }),
            )
        });

    let get_storage = warp::path!("getstorage")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(svc.clone()))
        .and_then(|req: PathRequest, svc: Arc<NamingService>| async move {
            reply_result(svc.get_storage(&req.path).await)
        });

    let delete = warp::path!("delete")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(svc.clone()))
        .and_then(|req: PathRequest, svc: Arc<NamingService>| async move {
            reply_result(
                svc.delete(&req.path)
                    .await
                    .map(|success| BooleanReturn { success }),
            )
        });

    let lock = warp::path!("lock")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(svc.clone()))
        .and_then(|req: LockRequest, svc: Arc<NamingService>| async move {
            reply_empty(
                svc.lock(&req.path, req.exclusive, req.requester.as_deref())
                    .await,
            )
        });

    let unlock = warp::path!("unlock")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(svc.clone()))
        .and_then(|req: LockRequest, svc: Arc<NamingService>| async move {
            reply_empty(
                svc.unlock(&req.path, req.exclusive, req.requester.as_deref())
                    .await,
            )
        });

    let publisher_register = warp::path!("publisher_register")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(svc.clone()))
        .and_then(
            |req: PublisherRegisterRequest, svc: Arc<NamingService>| async move {
                reply_result(svc.publisher_register(&req.publisher_id))
            },
        );

    let subscriber_register = warp::path!("subscriber_register")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(svc.clone()))
        .and_then(
            |req: SubscriberRegisterRequest, svc: Arc<NamingService>| async move {
                reply_result(svc.subscriber_register(&req.subscriber_id, &req.keywords))
            },
        );

    let replication = warp::path!("replication")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(svc))
        .and_then(|req: ReplicationRequest, svc: Arc<NamingService>| async move {
            reply_result(
                svc.replication(&req)
                    .await
                    .map(|success| BooleanReturn { success }),
            )
        });

    is_valid_path
        .or(is_directory)
        .or(list)
        .or(create_directory)
        .or(create_file)
        .or(get_storage)
        .or(delete)
        .or(lock)
        .or(unlock)
        .or(publisher_register)
        .or(subscriber_register)
        .or(replication)
}

pub fn registration_routes(
    svc: Arc<NamingService>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("register")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(svc))
        .and_then(|req: RegisterRequest, svc: Arc<NamingService>| async move {
            reply_result(svc.register(&req).map(|files| FilesReturn { files }))
        })
}

/// Serve both ports until shutdown.
pub async fn run(
    svc: Arc<NamingService>,
    bind_ip: IpAddr,
    service_port: u16,
    registration_port: u16,
) {
    let service = service_routes(svc.clone()).recover(handle_rejection);
    let registration = registration_routes(svc).recover(handle_rejection);
    info!(
        "naming server listening: service on {}:{}, registration on {}:{}",
        bind_ip, service_port, bind_ip, registration_port
    );
    tokio::join!(
        warp::serve(service).run(SocketAddr::new(bind_ip, service_port)),
        warp::serve(registration).run(SocketAddr::new(bind_ip, registration_port)),
    );
}
