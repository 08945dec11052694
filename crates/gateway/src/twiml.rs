//! Call-control markup returned to the carrier.
//!
//! Two documents exist: the connect markup that points the carrier at the
//! media WebSocket (with the custom parameters the bridge reads back on
//! `start`), and a failure markup that apologizes and hangs up.

/// Escape a string for use in XML attribute values and text nodes.
fn xml_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Parameters forwarded to the media stream on its `start` event.
pub struct StreamParameters<'a> {
    pub customer_phone: &'a str,
    pub call_sid: &'a str,
    pub carrier_number: &'a str,
}

/// Markup that greets the caller and connects the call to the media
/// WebSocket at `wss://<external_hostname>/media-stream`.
pub fn connect_markup(
    spa_name: &str,
    external_hostname: &str,
    params: &StreamParameters<'_>,
) -> String {
    let greeting = xml_escape(&format!("Benvenuto a {spa_name}. Un momento per favore..."));
    let url = xml_escape(&format!("wss://{external_hostname}/media-stream"));
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
  <Say voice="alice" language="it-IT">{greeting}</Say>
  <Connect>
    <Stream url="{url}">
      <Parameter name="customerPhone" value="{phone}"/>
      <Parameter name="callSid" value="{call}"/>
      <Parameter name="twilioNumber" value="{number}"/>
    </Stream>
  </Connect>
</Response>
"#,
        phone = xml_escape(params.customer_phone),
        call = xml_escape(params.call_sid),
        number = xml_escape(params.carrier_number),
    )
}

/// Markup for front-door failures: apologize in Italian and hang up.
pub fn error_markup() -> String {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
  <Say voice="alice" language="it-IT">Ci scusiamo, si è verificato un errore tecnico. La preghiamo di riprovare più tardi.</Say>
  <Hangup/>
</Response>
"#
    .to_owned()
}
