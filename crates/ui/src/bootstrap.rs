use cyberfarm_protocol::Bootstrap;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{window, Request, Response};

/// `GET /api/bootstrap`: session config plus the initial farm snapshot
pub async fn fetch_bootstrap(url: &str) -> Result<Bootstrap, JsValue> {
    let win = window().ok_or("No window")?;

    let req = Request::new_with_str(url)?;
    let resp_val = JsFuture::from(win.fetch_with_request(&req)).await?;
    let resp: Response = resp_val.dyn_into()?;

    if !resp.ok() {
        return Err(format!("bootstrap request failed: HTTP {}", resp.status()).into());
    }

    let text = JsFuture::from(resp.text()?)
        .await?
        .as_string()
        .ok_or("bootstrap body is not text")?;
    Bootstrap::from_json(&text).map_err(|e| JsValue::from_str(&format!("bad bootstrap: {e}")))
}
