//! Diagnostic HTML page: environment checks plus a connection-test form.
//!
//! The form posts `actn=C` to the tunnel itself and decodes the response header and
//! first block in the browser.

use crate::tunnel::Dispatcher;

const SYSTEM_TESTS_SLOT: &str = "<!--SYSTEM_TESTS-->";

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<title>SQL Tunnel Tester</title>
<style>
body { margin: 30px; font-family: Tahoma, sans-serif; font-size: 14px; color: #222; }
#page { max-width: 42em; margin: auto; }
table { width: 100%; }
fieldset { border: 1px solid #666; margin-bottom: 1.5em; }
input[type=text], input[type=password] { border: 1px solid #666; width: 200px; }
.TestDesc { width: 70%; }
.TestSucc { color: #00BB00; }
.TestFail { color: #DD0000; }
</style>
<script>
function byteAt(s, i) { return s.charCodeAt(i) & 0xff; }
function intAt(s, i) {
  return ((byteAt(s, i) << 24) | (byteAt(s, i + 1) << 16) | (byteAt(s, i + 2) << 8) | byteAt(s, i + 3)) >>> 0;
}
function blockAt(s, i) {
  var len = byteAt(s, i);
  if (len < 254) return s.substring(i + 1, i + 1 + len);
  return s.substring(i + 5, i + 5 + intAt(s, i + 1));
}
function show(text, ok) {
  var out = document.getElementById("ServerTest");
  out.className = ok ? "TestSucc" : "TestFail";
  out.textContent = text;
}
function testConnection() {
  var form = document.getElementById("TestServerForm");
  var params = [];
  for (var i = 0; i < form.elements.length; i++) {
    var el = form.elements[i];
    if (el.id) params.push(el.id + "=" + encodeURIComponent(el.value));
  }
  var xhr = new XMLHttpRequest();
  xhr.onreadystatechange = function () {
    if (xhr.readyState != 4) return;
    if (xhr.status != 200) { show("HTTP Error - " + xhr.status, false); return; }
    var body = xhr.responseText;
    var errno = intAt(body, 6);
    if (errno == 0) show("Connection Success!", true);
    else show(errno + " - " + blockAt(body, 16), false);
  };
  show("Connecting...", true);
  xhr.open("POST", "", true);
  xhr.overrideMimeType("text/plain; charset=x-user-defined");
  xhr.setRequestHeader("Content-type", "application/x-www-form-urlencoded");
  xhr.send(params.join("&"));
  return false;
}
</script>
</head>
<body>
<div id="page">
<h1>SQL Tunnel</h1>
<fieldset>
<legend>System Environment Test</legend>
<table>
<!--SYSTEM_TESTS-->
</table>
</fieldset>
<fieldset>
<legend>Server Test</legend>
<form id="TestServerForm" onsubmit="return testConnection();">
<input type="hidden" id="actn" value="C">
<table>
<tr><td>Hostname/IP Address:</td><td><input type="text" id="host" placeholder="localhost"></td></tr>
<tr><td>Port:</td><td><input type="text" id="port" placeholder="3306"></td></tr>
<tr><td>Username:</td><td><input type="text" id="login" placeholder="root"></td></tr>
<tr><td>Password:</td><td><input type="password" id="password"></td></tr>
<tr><td>Database:</td><td><input type="text" id="db"></td></tr>
<tr><td></td><td><input type="submit" value="Test Connection"></td></tr>
</table>
</form>
<div id="ServerTest"></div>
</fieldset>
</div>
</body>
</html>
"#;

fn test_row(description: &str, ok: bool, detail: &str) -> String {
    let class = if ok { "TestSucc" } else { "TestFail" };
    format!(
        "<tr><td class=\"TestDesc\">{}</td><td class=\"{}\">{}</td></tr>\n",
        description, class, detail
    )
}

fn yes_no(ok: bool) -> &'static str {
    if ok {
        "Yes"
    } else {
        "No"
    }
}

pub fn render(dispatcher: &Dispatcher) -> String {
    let floor = dispatcher.config().min_runtime_version;
    let supported = dispatcher.runtime_supported();
    let available = dispatcher.backend().is_available();

    let mut rows = String::new();
    rows.push_str(&test_row(
        &format!("Runtime version >= {}", floor),
        supported,
        &format!("{} ({})", yes_no(supported), dispatcher.runtime()),
    ));
    rows.push_str(&test_row(
        "MySQL client available",
        available,
        yes_no(available),
    ));

    PAGE_TEMPLATE.replace(SYSTEM_TESTS_SLOT, &rows)
}
