//! 测试辅助：用本地 axum 服务模拟上游市场和守护进程

use axum::Router;
use tokio::net::TcpListener;

/// 在随机端口启动服务，返回基础地址
pub async fn spawn_server(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}
