//! Static pages and scripts written into the web bundle.
//!
//! Templates use `@@KEY@@` placeholders so embedded JavaScript braces need
//! no escaping.

pub const INDEX_HTML: &str = "index.html";
pub const MAIN_MENU_HTML: &str = "main-menu.html";
pub const AR_VIEWER_HTML: &str = "ar-viewer.html";
pub const WEB_AR_VIEWER_HTML: &str = "web-ar-viewer.html";
pub const FRONTEND_JS: &str = "js/frontend-ar.js";

/// Every generated page, in write order.
pub const PAGES: &[&str] = &[INDEX_HTML, MAIN_MENU_HTML, AR_VIEWER_HTML, WEB_AR_VIEWER_HTML];

const THREE_JS: &str = "https://cdn.jsdelivr.net/npm/three@0.128.0/build/three.min.js";
const GLTF_LOADER_JS: &str =
    "https://cdn.jsdelivr.net/npm/three@0.128.0/examples/js/loaders/GLTFLoader.js";
const AR_THREEX_JS: &str =
    "https://cdn.jsdelivr.net/gh/AR-js-org/AR.js@3.4.7/three.js/build/ar-threex.js";

fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("@@{}@@", key), value)
    })
}

/// JSON safe to embed inside a `<script>` element.
pub fn script_json(value: &serde_json::Value) -> String {
    value.to_string().replace("</", "<\\/")
}

pub fn index_html(name: &str, activation_url: &str) -> String {
    fill(
        ACTIVATION_TEMPLATE,
        &[
            ("NAME", name),
            ("ACTIVATION_URL", &activation_url.replace('\'', "%27")),
        ],
    )
}

pub fn main_menu_html(name: &str) -> String {
    fill(MAIN_MENU_TEMPLATE, &[("NAME", name)])
}

pub fn ar_viewer_html(name: &str, content: &serde_json::Value) -> String {
    fill(
        AR_VIEWER_TEMPLATE,
        &[
            ("NAME", name),
            ("CONTENT", &script_json(content)),
            ("THREE", THREE_JS),
            ("GLTF", GLTF_LOADER_JS),
            ("THREEX", AR_THREEX_JS),
        ],
    )
}

pub fn web_ar_viewer_html(name: &str) -> String {
    fill(
        WEB_AR_VIEWER_TEMPLATE,
        &[
            ("NAME", name),
            ("THREE", THREE_JS),
            ("GLTF", GLTF_LOADER_JS),
            ("THREEX", AR_THREEX_JS),
        ],
    )
}

pub fn frontend_js() -> &'static str {
    FRONTEND_TEMPLATE
}

const ACTIVATION_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="es">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>@@NAME@@ - Activación</title>
<script src="capacitor.js"></script>
<style>
body { font-family: sans-serif; background: #f4f6f8; display: flex; align-items: center; justify-content: center; min-height: 100vh; margin: 0; }
.card { background: #fff; padding: 2rem; border-radius: 12px; box-shadow: 0 4px 16px rgba(0,0,0,.1); width: 90%; max-width: 360px; text-align: center; }
input { width: 100%; padding: .8rem; font-size: 1.1rem; text-transform: uppercase; box-sizing: border-box; margin: 1rem 0; }
button { width: 100%; padding: .8rem; font-size: 1rem; background: #1565c0; color: #fff; border: 0; border-radius: 6px; }
#status { min-height: 1.5rem; margin-top: 1rem; }
</style>
</head>
<body>
<div class="card">
  <h2>@@NAME@@</h2>
  <p>Introduce tu código de activación</p>
  <input id="code" placeholder="ECO-XXXX-XXXX-XXXX" autocomplete="off">
  <button id="activate">Activar</button>
  <div id="status"></div>
</div>
<script>
const ACTIVATION_URL = '@@ACTIVATION_URL@@';

function deviceId() {
  let id = localStorage.getItem('device_id');
  if (!id) {
    id = 'dev-' + Date.now().toString(36) + '-' + Math.random().toString(36).slice(2, 10);
    localStorage.setItem('device_id', id);
  }
  return id;
}

if (localStorage.getItem('app_activated') === 'true') {
  window.location.replace('main-menu.html');
}

document.getElementById('activate').addEventListener('click', async () => {
  const status = document.getElementById('status');
  const code = document.getElementById('code').value.trim().toUpperCase();
  if (!/^ECO-[0-9A-F]{4}-[0-9A-F]{4}-[0-9A-F]{4}$/.test(code)) {
    status.textContent = 'Formato de código no válido';
    return;
  }
  status.textContent = 'Verificando...';
  try {
    const response = await fetch(ACTIVATION_URL, {
      method: 'POST',
      headers: { 'Content-Type': 'application/json' },
      body: JSON.stringify({ token: code, device_id: deviceId() })
    });
    const data = await response.json();
    if (response.ok && data.success) {
      localStorage.setItem('app_activated', 'true');
      localStorage.setItem('activation_code', code);
      window.location.replace('main-menu.html');
    } else {
      status.textContent = data.message || 'Código no válido';
    }
  } catch (e) {
    status.textContent = 'No se pudo contactar con el servidor';
  }
});
</script>
</body>
</html>
"#;

const MAIN_MENU_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="es">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>@@NAME@@</title>
<script src="capacitor.js"></script>
<style>
body { font-family: sans-serif; margin: 0; background: #fafafa; text-align: center; }
img { width: 100%; max-height: 45vh; object-fit: cover; }
a.button { display: block; margin: 1rem auto; width: 80%; padding: 1rem; background: #1565c0; color: #fff; border-radius: 8px; text-decoration: none; }
</style>
</head>
<body>
<img src="portada.jpg" alt="@@NAME@@">
<h2>@@NAME@@</h2>
<a class="button" href="ar-viewer.html">Ver en realidad aumentada</a>
<a class="button" href="web-ar-viewer.html">Visor web</a>
<script>
if (localStorage.getItem('app_activated') !== 'true') {
  window.location.replace('index.html');
}
</script>
</body>
</html>
"#;

const AR_VIEWER_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="es">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>@@NAME@@ - AR</title>
<style>body { margin: 0; overflow: hidden; }</style>
<script>window.arContent = @@CONTENT@@;</script>
<script src="capacitor.js"></script>
<script src="@@THREE@@"></script>
<script src="@@GLTF@@"></script>
<script src="@@THREEX@@"></script>
</head>
<body>
<script src="js/frontend-ar.js"></script>
<script>startAr(window.arContent);</script>
</body>
</html>
"#;

const WEB_AR_VIEWER_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="es">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>@@NAME@@ - Visor web</title>
<style>body { margin: 0; overflow: hidden; }</style>
<script src="data/ar_content.js"></script>
<script src="@@THREE@@"></script>
<script src="@@GLTF@@"></script>
<script src="@@THREEX@@"></script>
</head>
<body>
<script src="js/frontend-ar.js"></script>
<script>startAr(MODELS);</script>
</body>
</html>
"#;

const FRONTEND_TEMPLATE: &str = r#"// Marker tracking over the camera feed, one GLB per marker.
function startAr(entries) {
  const renderer = new THREE.WebGLRenderer({ antialias: true, alpha: true });
  renderer.setSize(window.innerWidth, window.innerHeight);
  document.body.appendChild(renderer.domElement);

  const scene = new THREE.Scene();
  const camera = new THREE.Camera();
  scene.add(camera);
  scene.add(new THREE.HemisphereLight(0xffffff, 0x444444, 1.2));

  const source = new THREEx.ArToolkitSource({ sourceType: 'webcam' });
  const context = new THREEx.ArToolkitContext({
    cameraParametersUrl: 'data/camera_para.dat',
    detectionMode: 'mono'
  });

  function resize() {
    source.onResizeElement();
    source.copyElementSizeTo(renderer.domElement);
    if (context.arController) {
      source.copyElementSizeTo(context.arController.canvas);
    }
  }

  source.init(() => setTimeout(resize, 400));
  window.addEventListener('resize', resize);
  context.init(() => camera.projectionMatrix.copy(context.getProjectionMatrix()));

  const loader = new THREE.GLTFLoader();
  for (const entry of entries) {
    const root = new THREE.Group();
    scene.add(root);
    new THREEx.ArMarkerControls(context, root, {
      type: 'pattern',
      patternUrl: entry.markerUrl
    });
    loader.load(entry.modelUrl, (gltf) => root.add(gltf.scene));
  }

  (function loop() {
    requestAnimationFrame(loop);
    if (source.ready) {
      context.update(source.domElement);
    }
    renderer.render(scene, camera);
  })();
}
"#;
