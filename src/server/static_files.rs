pub const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Lead Locator</title>
</head>
<body>
  <h1>Find agents near a lead</h1>
  <form method="post" action="/api/v1/geocoding">
    <label for="leadid">Lead UUID</label>
    <input id="leadid" name="leadid" type="text" required
           placeholder="805a0dff-b76f-eb11-b0b0-000d3a5319cc">
    <button type="submit">Locate</button>
  </form>
</body>
</html>
"#;
