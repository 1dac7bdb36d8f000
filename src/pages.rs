//! Synthetic HTML pages served directly by the proxy.

/// Stock nginx welcome page, served to blocked user agents and as the
/// optional camouflage for the document root.
pub fn nginx_page() -> &'static str {
    r#"<!DOCTYPE html><html><head><title>Welcome to nginx!</title><style>body{width:35em;margin:0 auto;font-family:Tahoma,Verdana,Arial,sans-serif}</style></head><body><h1>Welcome to nginx!</h1><p>If you see this page, the nginx web server is successfully installed and working. Further configuration is required.</p><p>For online documentation and support please refer to<a href="http://nginx.org/">nginx.org</a>.<br/>Commercial support is available at<a href="http://nginx.com/">nginx.com</a>.</p><p><em>Thank you for using nginx.</em></p></body></html>"#
}

/// Landing page with a search box, shown to browsers hitting the document
/// root when no explicit root behavior is configured. Submitting forwards to
/// the legacy search endpoint, which the proxy relays upstream.
pub fn search_page() -> &'static str {
    r#"<!DOCTYPE html>
<html>
<head>
<title>Image Search</title>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<style>
body{font-family:-apple-system,BlinkMacSystemFont,"Segoe UI",Roboto,Arial,sans-serif;display:flex;flex-direction:column;justify-content:center;align-items:center;min-height:100vh;margin:0;background:linear-gradient(135deg,#1a90ff 0%,#003eb3 100%);color:#fff}
.container{text-align:center;width:100%;max-width:640px;padding:20px}
.title{font-size:2.2em;margin-bottom:12px;font-weight:700}
.subtitle{font-size:1.05em;margin-bottom:28px;color:rgba(255,255,255,0.9)}
.search-box{display:flex;height:52px;border-radius:10px;overflow:hidden;box-shadow:0 10px 25px rgba(0,0,0,0.15)}
#search-input{flex:1;padding:0 18px;font-size:16px;border:none;outline:none}
#search-button{width:110px;background:#0066ff;border:none;color:#fff;font-size:16px;cursor:pointer}
#search-button:hover{background:#0052cc}
</style>
</head>
<body>
<div class="container">
<h1 class="title">Image Search</h1>
<p class="subtitle">Search container images, then pull them through this mirror.</p>
<div class="search-box">
<input type="text" id="search-input" placeholder="nginx, redis, postgres..." autofocus>
<button id="search-button" onclick="performSearch()">Search</button>
</div>
</div>
<script>
function performSearch(){
  var q=document.getElementById('search-input').value.trim();
  if(q){location.href='/search?q='+encodeURIComponent(q);}
}
document.getElementById('search-input').addEventListener('keydown',function(e){
  if(e.key==='Enter'){performSearch();}
});
</script>
</body>
</html>"#
}
