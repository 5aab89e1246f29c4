/// POST JSON to the relay and parse the JSON answer.
/// If parsing fails, emit a `WARN` level tracing event with the raw body.
/// The request body is not logged: it may carry the sponsor key
#[macro_export]
macro_rules! json_post {
    ($client:expr, $url:expr, $params:expr, $expected:ty,) => {
        json_post!($client, $url, $params, $expected)
    };

    ($client:expr, $url:expr, $params:expr, $expected:ty) => {{
        let url = $url;
        let resp: reqwest::Response = $client.post(url.clone()).json($params).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        let result = serde_json::from_str::<$expected>(&text)
            .map_err(Into::<$crate::client::ClientError>::into);

        if result.is_err() {
            tracing::warn!(
                method = "POST",
                url = %url,
                status = status.as_u16(),
                response = text.as_str(),
                "Unexpected response from server"
            );
        }
        result
    }};
}

/// GET JSON from the relay.
/// If parsing fails, emit a `WARN` level tracing event with the raw body
#[macro_export]
macro_rules! json_get {
    ($client:expr, $url:expr, $expected:ty,) => {
        json_get!($client, $url, $expected)
    };
    ($client:expr, $url:expr, $expected:ty) => {{
        let url = $url;
        let resp: reqwest::Response = $client.get(url.clone()).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        let result = serde_json::from_str::<$expected>(&text)
            .map_err(Into::<$crate::client::ClientError>::into);

        if result.is_err() {
            tracing::warn!(
                method = "GET",
                url = %url,
                status = status.as_u16(),
                response = text.as_str(),
                "Unexpected response from server"
            );
        }
        result
    }};
}
