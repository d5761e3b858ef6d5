//! 远端执行策略
//!
//! 每个导航/排序/全量操作映射到路由表中的一个命名端点, 请求体为
//! [`RemoteRequest`], 响应为 `{rows, total_count, runtime}`。具体的
//! HTTP 客户端是外部协作方, 以 [`RemoteTransport`] 为边界注入;
//! 传输失败原样上抛, 缓冲保持调用前状态, 不做自动重试。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{FetchSpec, Fetched, QueryExecutor};
use crate::query::types::{QueryRuntime, SortState};
use crate::{Result, ResultsError};

/// 远端请求体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRequest {
    pub search_filter: String,

    /// 请求参数, CSV
    pub params: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_all: Option<bool>,
}

impl RemoteRequest {
    fn from_spec(spec: &FetchSpec) -> Self {
        let (sort, order) = match &spec.sort {
            Some(SortState { column, direction }) => {
                (Some(column.clone()), Some(direction.as_str().to_string()))
            }
            None => (None, None),
        };
        Self {
            search_filter: spec.search_filter.clone(),
            params: spec.params_csv.clone(),
            start: None,
            end: None,
            limit: spec.limit,
            sort,
            order,
            return_all: None,
        }
    }
}

/// 远端响应体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteResponse {
    pub rows: Vec<Vec<Value>>,
    pub total_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<QueryRuntime>,
}

/// 远端传输边界
///
/// 错误以字符串返回, 由策略包装成携带操作名的 [`ResultsError::Remote`]。
pub trait RemoteTransport {
    fn post(
        &mut self,
        route: &str,
        request: &RemoteRequest,
    ) -> std::result::Result<RemoteResponse, String>;
}

/// 端点路由表
///
/// 未配置路由表是任何远端调用的致命前置条件失败。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteMap {
    /// 查询端点 (排序重查/全量)
    pub query: String,
    /// 子集端点 (翻页/任意定位)
    pub subset: String,
    /// 单列端点, 可含 `{column}` 占位符
    pub column: String,
}

/// 远端执行策略
pub struct RemoteExecutor {
    routes: Option<RouteMap>,
    transport: Box<dyn RemoteTransport>,
}

impl RemoteExecutor {
    pub fn new(routes: Option<RouteMap>, transport: Box<dyn RemoteTransport>) -> Self {
        Self { routes, transport }
    }

    fn routes(&self, op: &'static str) -> Result<&RouteMap> {
        self.routes
            .as_ref()
            .ok_or(ResultsError::NoRouteMap { op })
    }

    fn call(
        &mut self,
        route: String,
        request: &RemoteRequest,
        op: &'static str,
    ) -> Result<RemoteResponse> {
        self.transport
            .post(&route, request)
            .map_err(|message| ResultsError::Remote { op, message })
    }

    fn fetched(response: RemoteResponse) -> Fetched {
        Fetched {
            rows: response.rows,
            total: Some(response.total_count),
            runtime: response.runtime,
        }
    }
}

impl QueryExecutor for RemoteExecutor {
    fn fetch_window(&mut self, spec: &FetchSpec, start: usize, end: usize) -> Result<Fetched> {
        let route = self.routes(spec.op)?.subset.clone();
        let mut request = RemoteRequest::from_spec(spec);
        request.start = Some(start);
        request.end = Some(end);
        let response = self.call(route, &request, spec.op)?;
        Ok(Self::fetched(response))
    }

    fn fetch_all(&mut self, spec: &FetchSpec) -> Result<Fetched> {
        let route = self.routes(spec.op)?.query.clone();
        let mut request = RemoteRequest::from_spec(spec);
        request.return_all = Some(true);
        let response = self.call(route, &request, spec.op)?;
        Ok(Self::fetched(response))
    }

    fn refetch(&mut self, spec: &FetchSpec) -> Result<Fetched> {
        let route = self.routes(spec.op)?.query.clone();
        let request = RemoteRequest::from_spec(spec);
        let response = self.call(route, &request, spec.op)?;
        Ok(Self::fetched(response))
    }

    fn fetch_column(
        &mut self,
        spec: &FetchSpec,
        full_name: &str,
        _position: usize,
    ) -> Result<Vec<Value>> {
        let template = self.routes(spec.op)?.column.clone();
        let route = if template.contains("{column}") {
            template.replace("{column}", full_name)
        } else {
            format!("{}/{}", template.trim_end_matches('/'), full_name)
        };
        let mut request = RemoteRequest::from_spec(spec);
        request.return_all = Some(true);
        let response = self.call(route, &request, spec.op)?;
        // 单列端点每行恰为一个值
        Ok(response
            .rows
            .into_iter()
            .map(|mut row| {
                if row.len() == 1 {
                    row.remove(0)
                } else {
                    Value::Array(row)
                }
            })
            .collect())
    }

    fn sorts_in_place(&self) -> bool {
        false
    }

    fn literal_query(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::types::SortDirection;
    use serde_json::json;

    struct ScriptedTransport {
        calls: Vec<(String, RemoteRequest)>,
        response: std::result::Result<RemoteResponse, String>,
    }

    impl RemoteTransport for ScriptedTransport {
        fn post(
            &mut self,
            route: &str,
            request: &RemoteRequest,
        ) -> std::result::Result<RemoteResponse, String> {
            self.calls.push((route.to_string(), request.clone()));
            self.response.clone()
        }
    }

    fn spec(op: &'static str) -> FetchSpec {
        FetchSpec {
            op,
            search_filter: "catalog.redshift < 0.1".to_string(),
            params_csv: "catalog.redshift".to_string(),
            limit: Some(100),
            sort: Some(SortState {
                column: "redshift".to_string(),
                direction: SortDirection::Desc,
            }),
        }
    }

    fn ok_response() -> RemoteResponse {
        RemoteResponse {
            rows: vec![vec![json!("8485-1901")]],
            total_count: 64,
            runtime: Some(QueryRuntime {
                seconds: 1,
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_missing_route_map_is_fatal() {
        let transport = ScriptedTransport {
            calls: vec![],
            response: Ok(ok_response()),
        };
        let mut exec = RemoteExecutor::new(None, Box::new(transport));
        assert!(matches!(
            exec.fetch_window(&spec("next"), 0, 10),
            Err(ResultsError::NoRouteMap { op: "next" })
        ));
    }

    #[test]
    fn test_window_request_carries_sort_and_bounds() {
        let transport = ScriptedTransport {
            calls: vec![],
            response: Ok(ok_response()),
        };
        let mut exec = RemoteExecutor::new(
            Some(RouteMap {
                query: "api/query".to_string(),
                subset: "api/query/subset".to_string(),
                column: "api/query/column/{column}".to_string(),
            }),
            Box::new(transport),
        );
        let fetched = exec.fetch_window(&spec("next"), 10, 20).unwrap();
        assert_eq!(fetched.total, Some(64));
        assert_eq!(fetched.rows.len(), 1);

        // 请求体携带窗口与排序
        let request = RemoteRequest::from_spec(&spec("next"));
        assert_eq!(request.sort.as_deref(), Some("redshift"));
        assert_eq!(request.order.as_deref(), Some("desc"));
        assert_eq!(request.return_all, None);
    }

    #[test]
    fn test_transport_failure_wraps_operation() {
        let transport = ScriptedTransport {
            calls: vec![],
            response: Err("connection refused".to_string()),
        };
        let mut exec = RemoteExecutor::new(
            Some(RouteMap {
                query: "api/query".to_string(),
                subset: "api/query/subset".to_string(),
                column: "api/query/column".to_string(),
            }),
            Box::new(transport),
        );
        match exec.fetch_all(&spec("get_all")) {
            Err(ResultsError::Remote { op, message }) => {
                assert_eq!(op, "get_all");
                assert!(message.contains("connection refused"));
            }
            other => panic!("expected remote error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_request_serialization_skips_absent_fields() {
        let request = RemoteRequest {
            search_filter: "f".to_string(),
            params: "p".to_string(),
            start: None,
            end: None,
            limit: None,
            sort: None,
            order: None,
            return_all: None,
        };
        let body = serde_json::to_string(&request).unwrap();
        assert!(!body.contains("start"));
        assert!(!body.contains("return_all"));
    }
}
