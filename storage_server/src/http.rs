use crate::storage_service::StorageService;
use dfs_lib::{
    BooleanReturn, CopyRequest, DataReturn, DfsError, DfsResult, ExceptionReturn, PathRequest,
    ReadRequest, SizeReturn, WriteRequest,
};
use log::info;
use serde::Serialize;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

/// The storage server's two HTTP surfaces: the client port carries
/// size/read/write, the command port carries the naming server's
/// create/delete/copy.

fn with_service(
    svc: Arc<StorageService>,
) -> impl Filter<Extract = (Arc<StorageService>,), Error = Infallible> + Clone {
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

pub fn client_routes(
    svc: Arc<StorageService>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let size = warp::path!("storage_size")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(svc.clone()))
        .and_then(|req: PathRequest, svc: Arc<StorageService>| async move {
            reply_result(svc.size(&req.path).await.map(|size| SizeReturn { size }))
        });

    let read = warp::path!("storage_read")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(svc.clone()))
        .and_then(|req: ReadRequest, svc: Arc<StorageService>| async move {
            reply_result(
                svc.read(&req.path, req.offset, req.length)
                    .await
                    .map(|data| DataReturn { data }),
            )
        });

    let write = warp::path!("storage_write")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(svc))
        .and_then(|req: WriteRequest, svc: Arc<StorageService>| async move {
            reply_result(
                svc.write(&req.path, req.offset, &req.data)
                    .await
                    .map(|success| BooleanReturn { success }),
            )
        });

    size.or(read).or(write)
}

pub fn command_routes(
    svc: Arc<StorageService>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let create = warp::path!("storage_create")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(svc.clone()))
        .and_then(|req: PathRequest, svc: Arc<StorageService>| async move {
            reply_result(
                svc.create(&req.path)
                    .await
                    .map(|success| BooleanReturn { success }),
            )
        });

    let delete = warp::path!("storage_delete")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(svc.clone()))
        .and_then(|req: PathRequest, svc: Arc<StorageService>| async move {
            reply_result(
                svc.delete(&req.path)
                    .await
                    .map(|success| BooleanReturn { success }),
            )
        });

    let copy = warp::path!("storage_copy")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(svc))
        .and_then(|req: CopyRequest, svc: Arc<StorageService>| async move {
            reply_result(
                svc.copy(&req.path, &req.server_ip, req.server_port)
                    .await
                    .map(|success| BooleanReturn { success }),
            )
        });

    create.or(delete).or(copy)
}

/// Serve both ports until shutdown.
pub async fn run(svc: Arc<StorageService>, bind_ip: IpAddr, client_port: u16, command_port: u16) {
    let client = client_routes(svc.clone()).recover(handle_rejection);
    let command = command_routes(svc).recover(handle_rejection);
    info!(
        "storage server listening: client on {}:{}, command on {}:{}",
        bind_ip, client_port, bind_ip, command_port
    );
    tokio::join!(
        warp::serve(client).run(SocketAddr::new(bind_ip, client_port)),
        warp::serve(command).run(SocketAddr::new(bind_ip, command_port)),
    );
}
